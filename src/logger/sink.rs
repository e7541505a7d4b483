//! Flush destinations.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// External destination for flushed log text.
///
/// `write` receives one whole batch, already rendered. Implementations report
/// their own failures as [`Error::Sink`](crate::Error::Sink).
pub trait LogSink: Send + Sync {
    fn write(&self, rendered: &str) -> Result<()>;
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn write(&self, rendered: &str) -> Result<()> {
        (**self).write(rendered)
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn write(&self, rendered: &str) -> Result<()> {
        (**self).write(rendered)
    }
}

/// Writes batches to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, rendered: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(rendered.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

/// Captures rendered batches in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    contents: Mutex<String>,
    writes: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.contents.lock().clone()
    }

    /// Written text split into lines
    pub fn lines(&self) -> Vec<String> {
        self.contents.lock().lines().map(str::to_string).collect()
    }

    /// Number of `write` calls received
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }

    pub fn clear(&self) {
        self.contents.lock().clear();
        *self.writes.lock() = 0;
    }
}

impl LogSink for MemorySink {
    fn write(&self, rendered: &str) -> Result<()> {
        self.contents.lock().push_str(rendered);
        *self.writes.lock() += 1;
        Ok(())
    }
}
