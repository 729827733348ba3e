//! Triangular solve kernel
//!
//! Block `b` solves row `map[b % m]` for the right-hand side columns of group
//! `b / m`. Each lane owns one column. Entries of the row are staged in
//! chunks of the block size; for every off-diagonal entry the block waits on
//! the latch of the referenced row, then updates its columns.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::constants::{CSRSM_MAX_DIM, CSRSM_MIN_DIM};
use crate::csrsm::latch::RowLatch;
use crate::device::{AtomicScalar, Scalar, Stream};
use crate::matrix::{CsrRef, DiagType, FillMode};

/// Lanes per block for `nrhs` right-hand sides
pub fn csrsm_block_size(nrhs: usize) -> usize {
    nrhs.next_power_of_two().clamp(CSRSM_MIN_DIM, CSRSM_MAX_DIM)
}

/// Operands of one solve launch
pub(crate) struct SolveArgs<'a, T: Scalar> {
    pub alpha: T,
    pub a: CsrRef<'a, T>,
    pub fill_mode: FillMode,
    pub diag_type: DiagType,
    /// Rows in launch order
    pub map: &'a [i32],
    /// Right-hand sides, row-major `m x nrhs`, overwritten with the solution
    pub x: &'a [T::Atomic],
    pub nrhs: usize,
    /// One latch per row and column group
    pub done: &'a [RowLatch],
    pub zero_pivot: &'a AtomicI32,
    pub backoff: bool,
}

/// Solves `op(A) X = alpha * B` in place, one block per (row, column group)
pub(crate) fn csrsm_kernel<T: Scalar>(stream: &Stream, block_size: usize, args: &SolveArgs<'_, T>) {
    let m = args.a.pattern.m;
    let groups = (args.nrhs + block_size - 1) / block_size;

    stream.launch(m * groups, |block| {
        let idx = block % m;
        let group = block / m;
        let row = args.map[idx] as usize;

        let first_col = group * block_size;
        let cols = first_col..(first_col + block_size).min(args.nrhs);
        let x_row = |r: usize| &args.x[r * args.nrhs + cols.start..r * args.nrhs + cols.end];

        let mut local_sum: Vec<T> = x_row(row)
            .iter()
            .map(|x| args.alpha * x.load(Ordering::Relaxed))
            .collect();

        let a = &args.a.pattern;
        let range = a.row_range(row);
        let mut diag = T::one();
        let mut staged_cols = Vec::with_capacity(block_size);
        let mut staged_vals = Vec::with_capacity(block_size);

        'entries: for chunk in (range.start..range.end).step_by(block_size) {
            let end = (chunk + block_size).min(range.end);
            staged_cols.clear();
            staged_vals.clear();
            staged_cols.extend((chunk..end).map(|j| a.col(j)));
            staged_vals.extend_from_slice(&args.a.val[chunk..end]);

            for (&col, &val) in staged_cols.iter().zip(&staged_vals) {
                if col == row {
                    if args.diag_type == DiagType::NonUnit {
                        if val == T::zero() {
                            args.zero_pivot
                                .fetch_min(row as i32 + a.base(), Ordering::AcqRel);
                        } else {
                            diag = val;
                        }
                    }
                    match args.fill_mode {
                        FillMode::Lower => break 'entries,
                        FillMode::Upper => continue,
                    }
                }

                match args.fill_mode {
                    FillMode::Lower if col > row => break 'entries,
                    FillMode::Upper if col < row => continue,
                    _ => {}
                }

                args.done[group * m + col].wait(args.backoff);
                for (sum, x) in local_sum.iter_mut().zip(x_row(col)) {
                    *sum = (-val).mul_add(x.load(Ordering::Relaxed), *sum);
                }
            }
        }

        let scale = diag.recip();
        for (sum, x) in local_sum.iter().zip(x_row(row)) {
            let value = if args.diag_type == DiagType::NonUnit {
                *sum * scale
            } else {
                *sum
            };
            x.store(value, Ordering::Relaxed);
        }
        args.done[group * m + row].signal();
    });
}
