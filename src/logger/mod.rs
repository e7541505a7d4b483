//! Buffered Logger
//!
//! Append-only message buffer that is periodically drained to an external
//! [`LogSink`] by a background thread. Every drained batch is also retained
//! in memory so callers can inspect exactly what was delivered.
//!
//! # Design
//!
//! - `log` only touches the buffer lock, held for a single push
//! - `flush` swaps the whole buffer out in one step, so a batch never holds
//!   part of a record and no record lands in two batches
//! - Flushes are serialized by the lock that guards the retained batches,
//!   which keeps batch order equal to capture order
//! - A failed sink write puts the captured records back in front of
//!   anything logged since

mod auto_flush;
mod buffered;
mod config;
mod record;
mod sink;

pub use auto_flush::AutoFlushHandle;
pub use buffered::{BufferedLogger, LoggerStats};
pub use config::{LoggerConfig, DEFAULT_AUTO_FLUSH_INTERVAL, DEFAULT_TIMESTAMP_FORMAT};
pub use record::{FlushedBatch, LogRecord};
pub use sink::{ConsoleSink, LogSink, MemorySink};
