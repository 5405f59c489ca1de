//! Core services and infrastructure

pub mod context;
pub mod control;
pub mod error_handling;
pub mod exit;
pub mod logging;
pub mod signals;
pub mod sync;
pub mod time;
pub mod version;
