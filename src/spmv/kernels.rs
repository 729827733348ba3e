//! CSRMV device kernels
//!
//! - [`csrmv_general`]: one sub-wavefront of `width` lanes per row.
//! - [`csrmv_adaptive`]: one block per row-block descriptor entry, dispatched
//!   on the entry kind (CSR-Stream, CSR-Vector, CSR-VectorL).
//!
//! Every row of `y` is written by exactly one lane: the owning sub-wavefront,
//! stream block, vector block, or the last-arriving piece of a split row.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::constants::{BLOCK_MULTIPLIER, CSRMV_GENERAL_DIM, ROW_BLOCK_NNZ, WG_SIZE};
use crate::device::atomic::atomic_zeros;
use crate::device::memory::GlobalMut;
use crate::device::reduce::{block_reduce_sum, wf_reduce_sum};
use crate::device::{grid_size, AtomicScalar, Scalar, Stream};
use crate::matrix::CsrRef;
use crate::spmv::row_blocks::{long_row_pieces, RowBlockKind, RowBlocks};

/// Operands of `y := alpha * A * x + beta * y`
///
/// Scalars are held by reference and only dereferenced inside the kernels.
pub(crate) struct SpmvArgs<'a, T> {
    pub alpha: &'a T,
    pub a: CsrRef<'a, T>,
    pub x: &'a [T],
    pub beta: &'a T,
}

impl<T: Scalar> SpmvArgs<'_, T> {
    #[inline]
    fn product(&self, j: usize) -> T {
        self.a.val[j] * self.x[self.a.pattern.col(j)]
    }

    /// Per-lane partial sums of the products in `range`, lanes striding it
    fn load_lanes(&self, range: Range<usize>, lanes: &mut [T]) {
        let stride = lanes.len();
        for (lid, lane) in lanes.iter_mut().enumerate() {
            let mut sum = T::zero();
            for j in (range.start + lid..range.end).step_by(stride) {
                sum += self.product(j);
            }
            *lane = sum;
        }
    }
}

/// Writes `alpha * sum + beta * y[row]`; `y` is not read when `beta == 0`
///
/// # Safety
///
/// The caller must be the only lane accessing `y[row]`.
#[inline]
unsafe fn store_row<T: Scalar>(y: &GlobalMut<'_, T>, row: usize, alpha: T, beta: T, sum: T) {
    let value = if beta == T::zero() {
        alpha * sum
    } else {
        alpha * sum + beta * y.read(row)
    };
    y.write(row, value);
}

/// CSR-Vector kernel with `width` lanes per row
pub(crate) fn csrmv_general<T: Scalar>(
    stream: &Stream,
    width: usize,
    args: &SpmvArgs<'_, T>,
    y: &GlobalMut<'_, T>,
) {
    let m = args.a.pattern.m;
    let rows_per_block = CSRMV_GENERAL_DIM / width;

    stream.launch(grid_size(m, rows_per_block), |block| {
        let alpha = *args.alpha;
        let beta = *args.beta;
        let mut lanes = vec![T::zero(); width];

        for w in 0..rows_per_block {
            let row = block * rows_per_block + w;
            if row >= m {
                break;
            }

            args.load_lanes(args.a.pattern.row_range(row), &mut lanes);
            let sum = wf_reduce_sum(&mut lanes);

            // SAFETY: each row belongs to exactly one sub-wavefront.
            unsafe { store_row(y, row, alpha, beta, sum) };
        }
    });
}

/// CSR-Adaptive kernel driven by a row-block descriptor
pub(crate) fn csrmv_adaptive<T: Scalar>(
    stream: &Stream,
    blocks: &RowBlocks,
    args: &SpmvArgs<'_, T>,
    y: &GlobalMut<'_, T>,
) {
    let n_blocks = blocks.num_blocks();

    // Per-call scratch for rows split across blocks.
    let partials = atomic_zeros::<T>(n_blocks);
    let arrivals: Vec<AtomicUsize> = (0..n_blocks).map(|_| AtomicUsize::new(0)).collect();

    stream.launch(n_blocks, |block| match blocks.kind(block) {
        RowBlockKind::Stream {
            first_row,
            stop_row,
            lanes_per_row,
        } => csr_stream(args, y, first_row, stop_row, lanes_per_row),
        RowBlockKind::Vector { row } => {
            let sum = block_sum(args, args.a.pattern.row_range(row));
            // SAFETY: a vector block owns its single row.
            unsafe { store_row(y, row, *args.alpha, *args.beta, sum) };
        }
        RowBlockKind::VectorLong {
            row,
            piece,
            first_block,
        } => {
            let range = args.a.pattern.row_range(row);
            let pieces = long_row_pieces(range.len());
            let chunk = BLOCK_MULTIPLIER * ROW_BLOCK_NNZ;

            let start = range.start + piece * chunk;
            let end = if piece + 1 == pieces {
                range.end
            } else {
                (start + chunk).min(range.end)
            };

            partials[block].store(block_sum(args, start..end), Ordering::Relaxed);

            // The last piece to arrive combines the partials in piece order.
            let arrived = arrivals[first_block].fetch_add(1, Ordering::AcqRel) + 1;
            if arrived == pieces {
                let sum = partials[first_block..first_block + pieces]
                    .iter()
                    .fold(T::zero(), |acc, p| acc + p.load(Ordering::Relaxed));
                // SAFETY: only the last-arriving piece writes the row.
                unsafe { store_row(y, row, *args.alpha, *args.beta, sum) };
            }
        }
    });
}

/// Sum of the products in `range` reduced by a whole workgroup
fn block_sum<T: Scalar>(args: &SpmvArgs<'_, T>, range: Range<usize>) -> T {
    let mut sdata = vec![T::zero(); WG_SIZE];
    args.load_lanes(range, &mut sdata);
    block_reduce_sum(&mut sdata)
}

/// CSR-Stream: stage products in shared memory, then reduce row by row
fn csr_stream<T: Scalar>(
    args: &SpmvArgs<'_, T>,
    y: &GlobalMut<'_, T>,
    first_row: usize,
    stop_row: usize,
    lanes_per_row: usize,
) {
    let a = &args.a.pattern;
    let alpha = *args.alpha;
    let beta = *args.beta;

    let first = a.row_range(first_row).start;
    let last = a.row_range(stop_row - 1).end;
    let partial_sums: Vec<T> = (first..last).map(|j| args.product(j)).collect();

    let mut lanes = vec![T::zero(); lanes_per_row.max(1)];
    for row in first_row..stop_row {
        let range = a.row_range(row);
        let local = range.start - first..range.end - first;

        let sum = if lanes_per_row > 1 {
            for (t, lane) in lanes.iter_mut().enumerate() {
                let mut acc = T::zero();
                for k in (local.start + t..local.end).step_by(lanes_per_row) {
                    acc += partial_sums[k];
                }
                *lane = acc;
            }
            wf_reduce_sum(&mut lanes)
        } else {
            partial_sums[local]
                .iter()
                .copied()
                .fold(T::zero(), |acc, v| acc + v)
        };

        // SAFETY: rows of a stream block belong to that block only.
        unsafe { store_row(y, row, alpha, beta, sum) };
    }
}
