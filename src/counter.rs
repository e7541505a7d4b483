//! Atomic Counter
//!
//! A resettable counter backed by a single cache-padded `AtomicU64`. Every
//! increment is one hardware read-modify-write, so concurrent increments are
//! never lost.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use tracing::trace;

use crate::error::{Error, Result};

/// Thread-safe counter
#[derive(Debug, Default)]
pub struct Counter {
    /// Current value, padded to its own cache line
    value: CachePadded<AtomicU64>,
}

impl Counter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current value
    pub fn count(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Add one, returning the new value
    pub fn increment(&self) -> Result<u64> {
        self.add(1)
    }

    /// Add `amount`, returning the new value.
    ///
    /// Fails with [`Error::InvalidArgument`] when `amount` is zero.
    pub fn increment_by(&self, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(Error::invalid_argument("Increment amount must be positive"));
        }
        self.add(amount)
    }

    fn add(&self, amount: u64) -> Result<u64> {
        // CAS loop so an overflowing add is rejected instead of wrapping.
        let previous = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(amount)
            })
            .map_err(|current| {
                Error::invalid_operation(format!(
                    "Incrementing {} by {} overflows the counter",
                    current, amount
                ))
            })?;
        Ok(previous + amount)
    }

    /// Set the value back to zero
    pub fn reset(&self) {
        let previous = self.value.swap(0, Ordering::AcqRel);
        trace!(previous, "counter reset");
    }
}

// =============================================================================
// Tests
// =============================================================================
