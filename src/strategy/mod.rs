//! Processing strategies
//!
//! A strategy owns the pipeline between one queue and one processor: it
//! decides how messages are fetched, how many jobs run at once and what
//! happens when a processor fails.

mod error;
pub mod parallel;
mod statistics;
pub mod throttle;
mod traits;

pub use error::{RuntimeError, RuntimeResult};
pub use parallel::{FatalHandler, OnProcessingError, ParallelProcessing};
pub use statistics::{Statistics, Status};
pub use throttle::Throttle;
pub use traits::Strategy;
