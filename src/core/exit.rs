//! Process exit codes

use strum_macros::{Display, EnumIter};

/// Exit codes surfaced by `Terminate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ExitCode {
    /// Normal or graceful exit
    Ok,
    /// Configuration problem detected before the dispatch loop started
    Misconfiguration,
    /// Strategy or processing failure at runtime
    RuntimeError,
    /// Graceful shutdown escalated to a forced exit
    ShutdownForced,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Ok => 0,
            ExitCode::Misconfiguration => 1,
            ExitCode::RuntimeError => 2,
            ExitCode::ShutdownForced => 3,
        }
    }

    /// Terminate the process immediately with this code
    pub fn exit(self) -> ! {
        std::process::exit(self.code())
    }
}
