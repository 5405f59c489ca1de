pub mod app;
pub mod config;
pub mod core;
pub mod plugin;
pub mod processor;
pub mod queue;
pub mod strategy;
