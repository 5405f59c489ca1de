//! Application module

pub mod cli;
pub mod lifecycle;
pub mod startup;
