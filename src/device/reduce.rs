//! Lane-level reduction and scan primitives
//!
//! Lane values live in a slice indexed by lane id. Each primitive performs the
//! same log-step exchange pattern a hardware wavefront or shared-memory tree
//! would, so kernels built on them keep the summation order of the device.

use std::ops::Add;

/// Inclusive scan across the lanes of a wavefront (Hillis-Steele)
///
/// After the call lane `i` holds the sum of lanes `0..=i`.
pub fn wf_scan_inclusive<T>(lanes: &mut [T])
where
    T: Copy + Add<Output = T>,
{
    let n = lanes.len();
    let mut stride = 1;
    while stride < n {
        // Walk downwards so every lane reads its neighbour's previous-step value.
        for i in (stride..n).rev() {
            lanes[i] = lanes[i] + lanes[i - stride];
        }
        stride <<= 1;
    }
}

/// Sums the lanes of a wavefront; the total ends up in the last lane
///
/// # Panics
///
/// Panics if `lanes` is empty.
pub fn wf_reduce_sum<T>(lanes: &mut [T]) -> T
where
    T: Copy + Add<Output = T>,
{
    wf_scan_inclusive(lanes);
    lanes[lanes.len() - 1]
}

/// Maximum over the lanes of a wavefront; the result ends up in the last lane
pub fn wf_reduce_max<T>(lanes: &mut [T]) -> T
where
    T: Copy + PartialOrd,
{
    let n = lanes.len();
    let mut stride = 1;
    while stride < n {
        for i in (stride..n).rev() {
            if lanes[i - stride] > lanes[i] {
                lanes[i] = lanes[i - stride];
            }
        }
        stride <<= 1;
    }
    lanes[n - 1]
}

/// Shared-memory tree reduction over a power-of-two block
///
/// The result is left in `sdata[0]` and returned.
pub fn block_reduce<T, F>(sdata: &mut [T], op: F) -> T
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    debug_assert!(sdata.len().is_power_of_two());
    let mut s = sdata.len() >> 1;
    while s > 0 {
        for tid in 0..s {
            sdata[tid] = op(sdata[tid], sdata[tid + s]);
        }
        s >>= 1;
    }
    sdata[0]
}

/// Block-wide sum, see [`block_reduce`]
pub fn block_reduce_sum<T>(sdata: &mut [T]) -> T
where
    T: Copy + Add<Output = T>,
{
    block_reduce(sdata, |a, b| a + b)
}

/// Block-wide maximum, see [`block_reduce`]
pub fn block_reduce_max<T>(sdata: &mut [T]) -> T
where
    T: Copy + Ord,
{
    block_reduce(sdata, std::cmp::max)
}

/// Reduces `groups` counters per lane across a block
///
/// `sdata[tid * groups + g]` holds lane `tid`'s counter for group `g`; after
/// the call `sdata[..groups]` holds the block totals.
pub fn block_reduce_groups(sdata: &mut [usize], groups: usize) {
    let block = sdata.len() / groups;
    debug_assert!(block.is_power_of_two());
    let mut s = block >> 1;
    while s > 0 {
        for tid in 0..s {
            for g in 0..groups {
                sdata[tid * groups + g] += sdata[(tid + s) * groups + g];
            }
        }
        s >>= 1;
    }
}

/// Block-wide inclusive prefix sum over one value per lane
pub fn block_scan_inclusive_sum<T>(sdata: &mut [T])
where
    T: Copy + Add<Output = T>,
{
    wf_scan_inclusive(sdata)
}
