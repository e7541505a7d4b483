//! Property-Based Tests for the Blocking Queue
//!
//! # Test Properties
//!
//! 1. **Per-Producer FIFO**: items from one producer are dequeued in the order
//!    that producer enqueued them, however producers interleave
//! 2. **Exactly Once**: every enqueued item is dequeued exactly once

#![cfg(test)]

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use super::BlockingQueue;

/// Strategy for per-producer item counts.
fn producers_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..300, 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: a single consumer sees each producer's items in order, once.
    #[test]
    fn prop_per_producer_fifo(counts in producers_strategy()) {
        let queue = Arc::new(BlockingQueue::new());

        let producers: Vec<_> = counts
            .iter()
            .enumerate()
            .map(|(p, &count)| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for seq in 0..count {
                        queue.enqueue((p, seq)).unwrap();
                    }
                })
            })
            .collect();
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.drain().collect::<Vec<_>>())
        };

        for producer in producers {
            producer.join().unwrap();
        }
        queue.complete();
        let consumed = consumer.join().unwrap();

        prop_assert_eq!(consumed.len(), counts.iter().sum::<usize>());
        for (p, &count) in counts.iter().enumerate() {
            let seen: Vec<usize> = consumed
                .iter()
                .filter(|(producer, _)| *producer == p)
                .map(|(_, seq)| *seq)
                .collect();
            prop_assert_eq!(seen, (0..count).collect::<Vec<_>>());
        }
    }

    /// Property: interleaved enqueue/try_dequeue on one thread behaves like a VecDeque.
    #[test]
    fn prop_sequential_matches_model(ops in prop::collection::vec(any::<Option<u16>>(), 0..200)) {
        let queue = BlockingQueue::new();
        let mut model = std::collections::VecDeque::new();

        for op in ops {
            match op {
                Some(item) => {
                    queue.enqueue(item).unwrap();
                    model.push_back(item);
                }
                None => prop_assert_eq!(queue.try_dequeue(), model.pop_front()),
            }
            prop_assert_eq!(queue.count(), model.len());
        }
    }
}
