//! Buffered logger core.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::auto_flush::{self, AutoFlushHandle};
use super::config::LoggerConfig;
use super::record::{FlushedBatch, LogRecord};
use super::sink::LogSink;
use crate::error::{Error, Result};

/// Retained batches; its lock also serializes flushes.
#[derive(Debug, Default)]
struct Flushed {
    next_sequence: u64,
    batches: Vec<FlushedBatch>,
}

/// Auto-flush worker control block
#[derive(Debug, Default)]
pub(super) struct Control {
    pub(super) stop_requested: bool,
    pub(super) running: bool,
}

/// Logger statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerStats {
    pub messages_logged: u64,
    /// Non-empty flushes delivered to the sink
    pub flushes: u64,
    pub records_flushed: u64,
    pub sink_failures: u64,
    /// Records waiting for the next flush
    pub pending: usize,
}

/// Thread-safe buffered logger
pub struct BufferedLogger {
    sink: Box<dyn LogSink>,
    config: LoggerConfig,
    buffer: Mutex<Vec<LogRecord>>,
    flushed: Mutex<Flushed>,
    pub(super) control: Mutex<Control>,
    pub(super) wake: Condvar,
    messages_logged: AtomicU64,
    flushes: AtomicU64,
    records_flushed: AtomicU64,
    sink_failures: AtomicU64,
}

impl BufferedLogger {
    /// Create a logger writing to `sink` with default configuration
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self::with_config(sink, LoggerConfig::default())
    }

    /// Create a logger writing to `sink` with custom configuration
    pub fn with_config(sink: impl LogSink + 'static, config: LoggerConfig) -> Self {
        Self {
            sink: Box::new(sink),
            config,
            buffer: Mutex::new(Vec::new()),
            flushed: Mutex::new(Flushed::default()),
            control: Mutex::new(Control::default()),
            wake: Condvar::new(),
            messages_logged: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            records_flushed: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Append a timestamped message
    pub fn log(&self, message: impl Into<String>) {
        let record = LogRecord::now(message);
        self.buffer.lock().push(record);
        self.messages_logged.fetch_add(1, Ordering::Relaxed);
    }

    /// Drain the buffer to the sink as one batch.
    ///
    /// Returns the number of records delivered. An empty buffer delivers and
    /// retains nothing. On sink failure the records go back to the front of
    /// the buffer and the sink's error is returned.
    pub fn flush(&self) -> Result<usize> {
        let mut flushed = self.flushed.lock();

        let captured = Captured {
            logger: self,
            records: std::mem::take(&mut *self.buffer.lock()),
        };
        if captured.records.is_empty() {
            return Ok(0);
        }

        let rendered: String = captured
            .records
            .iter()
            .map(|record| record.render(&self.config.timestamp_format))
            .collect();

        if let Err(e) = self.sink.write(&rendered) {
            warn!(records = captured.records.len(), error = %e, "Log sink write failed");
            self.sink_failures.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        let records = captured.delivered();
        let count = records.len();
        flushed.next_sequence += 1;
        let sequence = flushed.next_sequence;
        flushed.batches.push(FlushedBatch { sequence, records });

        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.records_flushed.fetch_add(count as u64, Ordering::Relaxed);

        Ok(count)
    }

    fn restore(&self, mut records: Vec<LogRecord>) {
        let mut buffer = self.buffer.lock();
        records.append(&mut buffer);
        *buffer = records;
    }

    /// Start a background thread flushing every `interval`.
    ///
    /// The thread runs until [`stop`](Self::stop), then flushes once more.
    /// Fails with [`Error::InvalidOperation`] if one is already running.
    #[instrument(skip(self), fields(thread = %self.config.thread_name))]
    pub fn start_auto_flush(self: &Arc<Self>, interval: Duration) -> Result<AutoFlushHandle> {
        {
            let mut control = self.control.lock();
            if control.running {
                return Err(Error::invalid_operation("Auto-flush is already running"));
            }
            control.running = true;
            control.stop_requested = false;
        }

        match auto_flush::spawn(Arc::clone(self), interval) {
            Ok(handle) => {
                info!("Auto-flush started");
                Ok(handle)
            }
            Err(e) => {
                self.control.lock().running = false;
                Err(e)
            }
        }
    }

    /// Start auto-flush at the configured `auto_flush_interval`
    pub fn start_default_auto_flush(self: &Arc<Self>) -> Result<AutoFlushHandle> {
        self.start_auto_flush(self.config.auto_flush_interval)
    }

    /// Ask the auto-flush thread to finish after its current cycle
    pub fn stop(&self) {
        let mut control = self.control.lock();
        control.stop_requested = true;
        self.wake.notify_all();
        debug!("Auto-flush stop requested");
    }

    /// Check if an auto-flush thread is running
    pub fn is_auto_flushing(&self) -> bool {
        self.control.lock().running
    }

    /// Snapshot of every retained batch, in flush order
    pub fn flushed_batches(&self) -> Vec<FlushedBatch> {
        self.flushed.lock().batches.clone()
    }

    /// Every flushed record, in log order
    pub fn flushed_records(&self) -> Vec<LogRecord> {
        self.flushed
            .lock()
            .batches
            .iter()
            .flat_map(|batch| batch.records.iter().cloned())
            .collect()
    }

    /// Number of records waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Get logger statistics
    pub fn stats(&self) -> LoggerStats {
        LoggerStats {
            messages_logged: self.messages_logged.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }

    /// Drop buffered records and retained batches, and clear the stop flag.
    ///
    /// A running auto-flush thread is left running.
    pub fn reset(&self) {
        let mut flushed = self.flushed.lock();
        let mut buffer = self.buffer.lock();
        buffer.clear();
        *flushed = Flushed::default();
        self.control.lock().stop_requested = false;

        self.messages_logged.store(0, Ordering::Relaxed);
        self.flushes.store(0, Ordering::Relaxed);
        self.records_flushed.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);

        debug!("Logger reset");
    }
}

/// Records taken out of the buffer by a flush. Unless marked delivered they
/// go back to the front of the buffer on drop, including when the sink
/// unwinds.
struct Captured<'a> {
    logger: &'a BufferedLogger,
    records: Vec<LogRecord>,
}

impl Captured<'_> {
    fn delivered(mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.records)
    }
}

impl Drop for Captured<'_> {
    fn drop(&mut self) {
        if !self.records.is_empty() {
            self.logger.restore(std::mem::take(&mut self.records));
        }
    }
}

impl std::fmt::Debug for BufferedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedLogger")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
