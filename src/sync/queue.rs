//! Fixed-capacity FIFO of owned strings with blocking put/get and a
//! one-shot finished indicator.
//!
//! Three [`Latch`]es track queue state: `NOT_FULL`, `NOT_EMPTY`, and
//! `FINISHED`. The ring buffer itself is protected by its own mutex,
//! separate from the latches: the queue mutex is always acquired
//! before any latch transition that depends on queue contents, and is
//! never held across a `Latch::wait`.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::latch::Latch;
use crate::error::{PipelineError, Result};

pub struct BoundedQueue {
    capacity: usize,
    slots: Mutex<VecDeque<String>>,
    not_full: Latch,
    not_empty: Latch,
    finished: Latch,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::argument("queue capacity must be positive"));
        }

        Ok(Self {
            capacity,
            slots: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Latch::new(true),
            not_empty: Latch::new(false),
            finished: Latch::new(false),
        })
    }

    /// Blocks until there is room, then appends `item` to the tail.
    pub fn put(&self, item: String) -> Result<()> {
        loop {
            self.not_full.wait();

            let mut slots = self.slots.lock();
            // Re-check under the lock: the NOT_FULL wakeup is a hint,
            // not a guarantee, under spurious wakeups or a competing
            // producer that claimed the last slot first.
            if slots.len() >= self.capacity {
                drop(slots);
                continue;
            }

            slots.push_back(item);
            let now_full = slots.len() >= self.capacity;
            drop(slots);

            if now_full {
                self.not_full.reset();
            } else {
                self.not_full.signal();
            }
            self.not_empty.signal();
            return Ok(());
        }
    }

    /// Blocks until an item is available or the queue is finished and
    /// drained, in which case it returns `None`.
    pub fn get(&self) -> Option<String> {
        loop {
            if self.finished.is_signaled() && self.slots.lock().is_empty() {
                return None;
            }

            self.not_empty.wait();

            let mut slots = self.slots.lock();
            if let Some(item) = slots.pop_front() {
                let still_not_empty = !slots.is_empty();
                drop(slots);

                if still_not_empty {
                    self.not_empty.signal();
                } else {
                    self.not_empty.reset();
                }
                self.not_full.signal();
                return Some(item);
            }
            drop(slots);

            if self.finished.is_signaled() {
                return None;
            }
            // Otherwise a spurious wakeup or a race with another
            // consumer that drained the item first; loop and re-wait.
        }
    }

    /// Marks the queue finished. Idempotent and monotonic: once set,
    /// never cleared. Also signals `NOT_EMPTY` so a consumer blocked on
    /// an empty queue with no further `put` coming wakes up and
    /// observes `finished && empty` instead of waiting forever.
    pub fn signal_finished(&self) {
        self.finished.signal();
        self.not_empty.signal();
    }

    pub fn wait_finished(&self) -> Result<()> {
        self.finished.wait();
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_signaled()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
