//! Blocking Queue
//!
//! Unbounded FIFO handing items from producers to consumers. Consumers block
//! while the queue is empty; `complete()` tells them no more items are coming.
//!
//! The item deque and the completion flag live under one mutex and consumers
//! wait on a single condition variable, re-checking `(empty && !completed)`
//! after every wake.

#[cfg(test)]
mod proptest;

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::{Error, Result};

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    completed: bool,
}

/// Thread-safe blocking FIFO queue
#[derive(Debug)]
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingQueue<T> {
    /// Create an empty, open queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                completed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append an item and wake one waiting consumer.
    ///
    /// Fails with [`Error::InvalidOperation`] once the queue is completed.
    pub fn enqueue(&self, item: T) -> Result<()> {
        let mut state = self.state.lock();
        if state.completed {
            return Err(Error::invalid_operation(
                "Cannot enqueue to a completed queue",
            ));
        }
        state.items.push_back(item);
        trace!(count = state.items.len(), "enqueued");
        self.available.notify_one();
        Ok(())
    }

    /// Remove the oldest item, blocking while the queue is empty and open.
    ///
    /// Returns `None` once the queue is completed and drained.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.completed {
            self.available.wait(&mut state);
        }
        state.items.pop_front()
    }

    /// Remove the oldest item without blocking
    pub fn try_dequeue(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Mark the queue completed and wake every waiting consumer. Idempotent.
    pub fn complete(&self) {
        let mut state = self.state.lock();
        if !state.completed {
            state.completed = true;
            debug!(remaining = state.items.len(), "Queue completed");
        }
        self.available.notify_all();
    }

    /// Drop all items and reopen the queue
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.completed = false;
        debug!("Queue reset");
    }

    /// Number of queued items
    pub fn count(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    /// Iterate over dequeued items until the queue is completed and empty
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.dequeue())
    }
}

// =============================================================================
// Tests
// =============================================================================
