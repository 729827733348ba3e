//! Scalar types and their atomic cells
//!
//! Kernels accumulate floating-point values across lanes and blocks. The
//! standard library has no atomic floats, so each [`Scalar`] names an atomic
//! cell built on the integer atomic of the same width.

use num_traits::Float;
use std::fmt::Debug;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Floating-point element type supported by the kernels (`f32`, `f64`)
pub trait Scalar: Float + AddAssign + Debug + Default + Send + Sync + 'static {
    /// Atomic cell holding a value of this type
    type Atomic: AtomicScalar<Self>;

    /// Precision prefix used in routine names (`s` or `d`)
    const PREFIX: char;
}

/// Atomic cell for a [`Scalar`]
pub trait AtomicScalar<T>: Send + Sync {
    /// Creates a cell holding `value`
    fn new(value: T) -> Self;

    /// Loads the current value
    fn load(&self, order: Ordering) -> T;

    /// Stores `value`
    fn store(&self, value: T, order: Ordering);

    /// Adds `value` and returns the previous value
    fn fetch_add(&self, value: T, order: Ordering) -> T;
}

/// `f32` cell backed by an `AtomicU32`
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

/// `f64` cell backed by an `AtomicU64`
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicScalar<f32> for AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    fn store(&self, value: f32, order: Ordering) {
        self.0.store(value.to_bits(), order)
    }

    fn fetch_add(&self, value: f32, order: Ordering) -> f32 {
        let prev = self
            .0
            .fetch_update(order, Ordering::Relaxed, |bits| {
                Some((f32::from_bits(bits) + value).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        f32::from_bits(prev)
    }
}

impl AtomicScalar<f64> for AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.0.load(order))
    }

    fn store(&self, value: f64, order: Ordering) {
        self.0.store(value.to_bits(), order)
    }

    fn fetch_add(&self, value: f64, order: Ordering) -> f64 {
        let prev = self
            .0
            .fetch_update(order, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        f64::from_bits(prev)
    }
}

impl Scalar for f32 {
    type Atomic = AtomicF32;
    const PREFIX: char = 's';
}

impl Scalar for f64 {
    type Atomic = AtomicF64;
    const PREFIX: char = 'd';
}

/// Allocates `len` atomic cells initialized to zero
pub(crate) fn atomic_zeros<T: Scalar>(len: usize) -> Vec<T::Atomic> {
    (0..len).map(|_| T::Atomic::new(T::zero())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fetch_add_returns_previous() {
        let cell = AtomicF64::new(1.5);
        assert_eq!(cell.fetch_add(2.0, Ordering::Relaxed), 1.5);
        assert_eq!(cell.load(Ordering::Relaxed), 3.5);
    }

    #[test]
    fn test_concurrent_accumulation() {
        let cell = Arc::new(AtomicF32::new(0.0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.fetch_add(1.0, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cell.load(Ordering::Relaxed), 4000.0);
    }
}
