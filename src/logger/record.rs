//! Log records and flushed batches.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A single logged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Local time at which `log` was called
    pub timestamp: DateTime<Local>,
    /// Message text, stored verbatim
    pub message: String,
}

impl LogRecord {
    /// Stamp `message` with the current local time
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
        }
    }

    /// Render as `[<timestamp>] <message>` followed by a newline
    pub fn render(&self, timestamp_format: &str) -> String {
        format!(
            "[{}] {}\n",
            self.timestamp.format(timestamp_format),
            self.message
        )
    }
}

/// Records delivered to the sink by one flush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushedBatch {
    /// 1-based position among retained batches
    pub sequence: u64,
    /// Captured records in log order
    pub records: Vec<LogRecord>,
}

impl FlushedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Concatenated rendering of every record, as written to the sink
    pub fn render(&self, timestamp_format: &str) -> String {
        self.records
            .iter()
            .map(|record| record.render(timestamp_format))
            .collect()
    }
}
