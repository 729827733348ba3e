//! Shared views of caller-owned output buffers
//!
//! A kernel launch hands the same output buffer to every block. Blocks write
//! disjoint elements (one row of `y`, one row span of `C`), which the borrow
//! checker cannot express for a slice shared across threads. [`GlobalMut`]
//! carries that contract explicitly.

use std::marker::PhantomData;

/// A mutable buffer shared by all blocks of one launch
///
/// Indices are bounds-checked. The caller guarantees that no element is
/// accessed by two lanes concurrently when at least one of them writes.
pub(crate) struct GlobalMut<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: access is restricted to `unsafe` methods whose contract rules out
// data races; the view itself only hands out copies of `T`.
unsafe impl<T: Send> Send for GlobalMut<'_, T> {}
unsafe impl<T: Send> Sync for GlobalMut<'_, T> {}

impl<'a, T: Copy> GlobalMut<'a, T> {
    /// Wraps `slice` for the duration of a launch
    pub(crate) fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// Reads element `idx`
    ///
    /// # Safety
    ///
    /// No other lane may write `idx` concurrently.
    pub(crate) unsafe fn read(&self, idx: usize) -> T {
        assert!(idx < self.len, "index {} out of bounds ({})", idx, self.len);
        *self.ptr.add(idx)
    }

    /// Writes element `idx`
    ///
    /// # Safety
    ///
    /// No other lane may access `idx` concurrently.
    pub(crate) unsafe fn write(&self, idx: usize, value: T) {
        assert!(idx < self.len, "index {} out of bounds ({})", idx, self.len);
        *self.ptr.add(idx) = value;
    }
}
