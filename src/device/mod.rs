//! # Compute device model
//!
//! Kernels in this crate are written against a small device model:
//!
//! - A [`Stream`] owns a pool of worker threads, one per *compute unit*.
//! - [`Stream::launch`] runs a grid of *blocks*. Compute units claim block
//!   indices in ascending order from a shared counter and run each block to
//!   completion, so any claimed block is resident until it finishes.
//! - Lanes inside a block are executed by the owning compute unit in phases;
//!   block-shared memory is block-local storage.
//! - Blocks communicate only through atomics ([`atomic`]) and through
//!   disjoint writes into shared outputs ([`memory`]).
//!
//! A launch returns once every block has finished, which makes launches on
//! one stream FIFO-ordered.

pub mod atomic;
pub mod config;
pub(crate) mod memory;
pub mod reduce;

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, SparseError};

pub use atomic::{AtomicF32, AtomicF64, AtomicScalar, Scalar};
pub use config::{DeviceProperties, HandleConfig, LayerMode, PointerMode};

/// An in-order execution queue bound to a set of compute units
pub struct Stream {
    pool: rayon::ThreadPool,
    props: DeviceProperties,
}

impl Stream {
    /// Creates a stream with one worker thread per compute unit
    pub fn new(props: DeviceProperties) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(props.compute_units.max(1))
            .thread_name(|i| format!("csrkit-cu-{}", i))
            .build()
            .map_err(|e| SparseError::Internal(e.to_string()))?;

        Ok(Self { pool, props })
    }

    /// Device properties of this stream
    pub fn properties(&self) -> &DeviceProperties {
        &self.props
    }

    /// Number of compute units
    pub fn compute_units(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `kernel(block)` for every block in `0..grid`
    ///
    /// Blocks are claimed in ascending order. Each compute unit keeps claiming
    /// blocks until the grid is exhausted; the call returns when all blocks
    /// have completed.
    pub fn launch<F>(&self, grid: usize, kernel: F)
    where
        F: Fn(usize) + Sync,
    {
        if grid == 0 {
            return;
        }

        let next = AtomicUsize::new(0);
        self.pool.broadcast(|_| loop {
            let block = next.fetch_add(1, Ordering::Relaxed);
            if block >= grid {
                break;
            }
            kernel(block);
        });
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("compute_units", &self.compute_units())
            .field("wavefront_size", &self.props.wavefront_size)
            .finish()
    }
}

/// Number of blocks of size `block` needed to cover `n` items
pub fn grid_size(n: usize, block: usize) -> usize {
    (n + block - 1) / block
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn stream(units: usize) -> Stream {
        Stream::new(HandleConfig::with_device(units, 64).device).unwrap()
    }

    #[test]
    fn test_launch_runs_every_block_once() {
        let s = stream(4);
        let hits: Vec<AtomicU32> = (0..1000).map(|_| AtomicU32::new(0)).collect();
        s.launch(hits.len(), |b| {
            hits[b].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_empty_grid() {
        let s = stream(2);
        s.launch(0, |_| panic!("no block should run"));
    }

    #[test]
    fn test_blocks_may_wait_on_earlier_blocks() {
        // Block b spins until block b-1 has published; in-order claiming
        // guarantees the chain completes even with a single compute unit.
        for units in [1, 3] {
            let s = stream(units);
            let flags: Vec<AtomicU32> = (0..64).map(|_| AtomicU32::new(0)).collect();
            s.launch(flags.len(), |b| {
                if b > 0 {
                    while flags[b - 1].load(Ordering::Acquire) == 0 {
                        std::thread::yield_now();
                    }
                }
                flags[b].store(1, Ordering::Release);
            });
            assert!(flags.iter().all(|f| f.load(Ordering::Relaxed) == 1));
        }
    }

    #[test]
    fn test_grid_size() {
        assert_eq!(grid_size(0, 256), 0);
        assert_eq!(grid_size(256, 256), 1);
        assert_eq!(grid_size(257, 256), 2);
    }
}
