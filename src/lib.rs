//! Lockstep - Shared-State Concurrency Primitives
//!
//! Five small components that stay correct under unrestricted concurrent use
//! from real OS threads.
//!
//! # Components
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ Ledger       │ per-account Mutex, check-then-act withdrawal │
//! │ Counter      │ single AtomicU64, CAS overflow check         │
//! │ Cache        │ single-flight memoization per key            │
//! │ Logger       │ buffered records, background flush thread    │
//! │ Queue        │ Mutex + Condvar producer/consumer FIFO       │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`ledger`] - Accounts with exact balances and atomic transfers
//! - [`counter`] - Atomic counter
//! - [`cache`] - Single-flight memoizing cache
//! - [`logger`] - Buffered logger with auto-flush
//! - [`queue`] - Blocking producer/consumer queue
//! - [`error`] - Error types

pub mod cache;
pub mod counter;
pub mod error;
pub mod ledger;
pub mod logger;
pub mod queue;

// Re-export commonly used types
pub use cache::{CacheStats, SingleFlightCache};
pub use counter::Counter;
pub use error::{Error, Result};
pub use ledger::{Account, AccountId, Ledger};
pub use logger::{
    AutoFlushHandle, BufferedLogger, ConsoleSink, FlushedBatch, LogRecord, LogSink,
    LoggerConfig, MemorySink,
};
pub use queue::BlockingQueue;
