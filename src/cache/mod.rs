//! Single-Flight Cache
//!
//! Memoizes an expensive, caller-supplied computation per key. When several
//! threads ask for the same missing key at once, exactly one of them runs the
//! computation and the others wait for its result.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  SingleFlightCache                        │
//! ├───────────────────────────────────────────────────────────┤
//! │  Mutex<Table>  { generation, slots: HashMap<K, Slot> }    │
//! │                                 │                         │
//! │              ┌──────────────────┴───────────────┐         │
//! │         Slot::Ready(V)                Slot::Pending(Flight)│
//! │                                    Mutex<State> + Condvar │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design
//!
//! - The table lock is held only to look up or claim a slot, never while the
//!   computation runs, so unrelated keys proceed in parallel
//! - The first arriver installs an in-flight marker; later arrivers
//!   wait on its condition variable
//! - `clear()` bumps the generation; a computation claimed in an older
//!   generation still answers its own waiters but never repopulates the table
//! - A failed computation is shared with its waiters and not cached
//! - A panicking computation abandons its flight and a waiter takes over

mod flight;
mod metrics;
mod single_flight;

pub use metrics::{CacheMetrics, CacheStats};
pub use single_flight::{ComputeFn, SingleFlightCache};
