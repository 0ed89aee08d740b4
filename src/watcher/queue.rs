//! Bounded FIFO buffering ready monitors between polling and runner fan-out.
//!
//! The queue is the watcher's admission control: polling can outrun script
//! completion, and the fixed capacity is what keeps the engine from spawning
//! an unbounded number of subprocesses. Push on full and pop on empty are
//! explicit failures, never blocking.

use crate::monitor::Monitor;
use crate::types::{Error, Result};

/// Fixed-capacity FIFO of monitors awaiting a runner slot.
///
/// Ordering is strict first-in-first-out: the element at index 0 is always
/// the next out, and a pop shifts the remaining elements one slot forward so
/// index order equals insertion order (no wraparound).
#[derive(Debug)]
pub struct MonitorQueue {
    capacity: usize,
    items: Vec<Monitor>,
}

impl MonitorQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Maximum number of queued monitors.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of monitors currently queued.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a monitor at the tail.
    pub fn push(&mut self, monitor: Monitor) -> Result<()> {
        if self.items.len() == self.capacity {
            return Err(Error::QueueFull {
                capacity: self.capacity,
            });
        }
        self.items.push(monitor);
        Ok(())
    }

    /// Remove and return the monitor at the head.
    pub fn pop(&mut self) -> Result<Monitor> {
        if self.items.is_empty() {
            return Err(Error::QueueEmpty);
        }
        Ok(self.items.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Interpreter;
    use crate::types::{MonitorId, RequestId, UserId};
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    fn monitor(id: i64) -> Monitor {
        Monitor {
            id: MonitorId::new(id),
            request_id: RequestId::new(id),
            created_by: UserId::new(1),
            interpreter: Interpreter::python(),
            script_path: PathBuf::from("check.py"),
            created_at: Utc::now(),
            last_ran_at: None,
            wait_period_minutes: 0,
            expected_runtime_secs: 0,
        }
    }

    #[test]
    fn new_queue_reports_capacity_and_zero_size() {
        let q = MonitorQueue::new(3);
        assert_eq!(q.capacity(), 3);
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
    }

    #[test]
    fn push_grows_size() {
        let mut q = MonitorQueue::new(2);
        q.push(monitor(1)).unwrap();
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn push_on_full_fails() {
        let mut q = MonitorQueue::new(1);
        q.push(monitor(1)).unwrap();
        let err = q.push(monitor(2)).unwrap_err();
        assert!(matches!(err, Error::QueueFull { capacity: 1 }));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn pop_drains_in_insertion_order() {
        let mut q = MonitorQueue::new(3);
        q.push(monitor(1)).unwrap();
        q.push(monitor(2)).unwrap();
        assert_eq!(q.pop().unwrap().id, MonitorId::new(1));
        q.push(monitor(3)).unwrap();
        assert_eq!(q.pop().unwrap().id, MonitorId::new(2));
        assert_eq!(q.pop().unwrap().id, MonitorId::new(3));
        assert!(q.is_empty());
    }

    #[test]
    fn pop_on_empty_fails() {
        let mut q = MonitorQueue::new(1);
        assert!(matches!(q.pop().unwrap_err(), Error::QueueEmpty));
    }

    #[test]
    fn queue_is_reusable_after_popping() {
        let mut q = MonitorQueue::new(2);
        q.push(monitor(1)).unwrap();
        q.push(monitor(2)).unwrap();
        q.pop().unwrap();
        q.push(monitor(3)).unwrap();
        q.pop().unwrap();
        q.push(monitor(4)).unwrap();
        assert_eq!(q.len(), 2);
    }

    proptest! {
        /// After any sequence of operations the size equals accepted pushes
        /// minus successful pops, and elements leave in insertion order.
        #[test]
        fn fifo_invariants_hold(ops in prop::collection::vec(any::<bool>(), 0..64)) {
            let mut q = MonitorQueue::new(4);
            let mut model: VecDeque<i64> = VecDeque::new();
            let mut accepted = 0i64;
            let mut popped = 0i64;

            for (i, push) in ops.into_iter().enumerate() {
                if push {
                    if q.push(monitor(i as i64)).is_ok() {
                        model.push_back(i as i64);
                        accepted += 1;
                    } else {
                        prop_assert_eq!(model.len(), 4);
                    }
                } else {
                    match q.pop() {
                        Ok(m) => {
                            popped += 1;
                            prop_assert_eq!(Some(m.id.as_i64()), model.pop_front());
                        }
                        Err(_) => prop_assert!(model.is_empty()),
                    }
                }
                prop_assert_eq!(q.len() as i64, accepted - popped);
            }
        }
    }
}
