//! Completion flags between blocks of the triangular solve
//!
//! A block solving row `i` signals its latch after writing `X[i, :]`; blocks
//! that depend on row `i` wait on the latch before reading it. The release
//! store and acquire load order the row's data.

use std::hint::spin_loop;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use crate::constants::SPIN_BACKOFF_CAP;

/// One-shot completion flag for a solved row
#[derive(Debug, Default)]
pub struct RowLatch(AtomicU32);

impl RowLatch {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Publishes every write made before this call
    pub fn signal(&self) {
        self.0.store(1, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire) != 0
    }

    /// Spins until the latch is signalled
    ///
    /// With `backoff` the waiter spins for a growing number of iterations
    /// between polls and yields its thread once the count reaches
    /// [`SPIN_BACKOFF_CAP`].
    pub fn wait(&self, backoff: bool) {
        let mut times_through: u32 = 1;
        while !self.is_set() {
            if !backoff {
                spin_loop();
                continue;
            }
            for _ in 0..times_through {
                spin_loop();
            }
            if times_through < SPIN_BACKOFF_CAP {
                times_through += 1;
            } else {
                thread::yield_now();
            }
        }
    }
}

/// Allocates `len` unsignalled latches
pub(crate) fn latches(len: usize) -> Vec<RowLatch> {
    (0..len).map(|_| RowLatch::new()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    #[test]
    fn test_signal_sets_latch() {
        let latch = RowLatch::new();
        assert!(!latch.is_set());
        latch.signal();
        assert!(latch.is_set());
        latch.wait(true);
    }

    #[test]
    fn test_wait_observes_data_written_before_signal() {
        for backoff in [false, true] {
            let latch = Arc::new(RowLatch::new());
            let data = Arc::new(AtomicU64::new(0));

            let producer = {
                let latch = Arc::clone(&latch);
                let data = Arc::clone(&data);
                thread::spawn(move || {
                    data.store(42, Ordering::Relaxed);
                    latch.signal();
                })
            };

            latch.wait(backoff);
            assert_eq!(data.load(Ordering::Relaxed), 42);
            producer.join().unwrap();
        }
    }
}
