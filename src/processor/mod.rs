//! Processor capability and built-in processors

pub mod builtin;
mod error;
mod traits;

pub use error::{ProcessError, ProcessResult};
pub use traits::Processor;
