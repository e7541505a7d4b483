use std::time::Duration;

/// Default period between background flushes
pub const DEFAULT_AUTO_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Default `chrono` format for record timestamps (`HH:MM:SS.mmm`)
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%H:%M:%S%.3f";

/// Buffered logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Period used by [`start_default_auto_flush`](super::BufferedLogger::start_default_auto_flush)
    pub auto_flush_interval: Duration,
    /// Name given to the auto-flush thread
    pub thread_name: String,
    /// `chrono` strftime pattern used when rendering records
    pub timestamp_format: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            auto_flush_interval: DEFAULT_AUTO_FLUSH_INTERVAL,
            thread_name: "log-flusher".to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}
