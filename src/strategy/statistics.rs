//! Strategy statistics snapshot and its table rendering

use chrono::{DateTime, Utc};
use prettytable::{format, row, Table};
use std::fmt;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Status {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub strategy: String,
    pub queue: String,
    pub processor: String,
    pub status: Status,
    /// Jobs the processor acknowledged
    pub processed: u64,
    /// Jobs whose processor returned an error
    pub failed: u64,
    pub rejected: u64,
    pub consume_errors: u64,
    pub started_at: Option<DateTime<Utc>>,
    /// Backlog reported by the queue, when it can tell
    pub messages_in_queue: Option<usize>,
}

impl Statistics {
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(row!["Strategy", "Value"]);
        table.add_row(row!["Name", self.strategy]);
        table.add_row(row!["Status", self.status]);
        table.add_row(row!["Queue", self.queue]);
        table.add_row(row!["Processor", self.processor]);
        table.add_row(row![
            "Started",
            self.started_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string())
        ]);
        table.add_row(row!["Processed", self.processed]);
        table.add_row(row!["Failed", self.failed]);
        table.add_row(row!["Rejected", self.rejected]);
        table.add_row(row!["Consume errors", self.consume_errors]);
        table.add_row(row![
            "Messages in queue",
            self.messages_in_queue
                .map(|n| n.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        ]);
        table
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_table())
    }
}
