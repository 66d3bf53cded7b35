//! Manual-reset binary event with durable signal-before-wait delivery.
//!
//! A plain `Condvar::wait` loop on a boolean flag gives this as long as
//! the flag is only ever flipped under the same mutex the waiter holds
//! while checking it, which is exactly the pattern below. The flag
//! stays signaled until explicitly `reset`, so a late `wait` still
//! observes an earlier `signal` instead of blocking forever.

use parking_lot::{Condvar, Mutex};

pub struct Latch {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl Latch {
    pub fn new(initially_signaled: bool) -> Self {
        Self {
            signaled: Mutex::new(initially_signaled),
            condvar: Condvar::new(),
        }
    }

    /// Block until signaled. Does not reset the flag; a second `wait`
    /// on an already-signaled latch returns immediately. `parking_lot`'s
    /// `Condvar` has no poisoning or timeout here, so this cannot fail.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.condvar.wait(&mut signaled);
        }
    }

    /// Sets the flag and wakes one waiter. A signal that arrives
    /// before any `wait` is not lost: the next `wait` sees the flag
    /// already set and returns without blocking.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_one();
    }

    pub fn reset(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_signal_before_wait_is_not_lost() {
        let latch = Latch::new(false);
        latch.signal();
        latch.wait();
    }

    #[test]
    fn test_reset_then_signal_then_wait_releases() {
        let latch = Latch::new(false);
        latch.signal();
        latch.signal();
        latch.reset();
        latch.signal();
        latch.wait();
    }

    #[test]
    fn test_wait_blocks_until_signaled_from_another_thread() {
        let latch = Arc::new(Latch::new(false));
        let latch2 = Arc::clone(&latch);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            latch2.signal();
        });

        latch.wait();
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_is_idempotent_while_signaled() {
        let latch = Latch::new(true);
        latch.wait();
        latch.wait();
    }
}
