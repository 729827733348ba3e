//! # Sparse triangular solve with multiple right-hand sides (CSRSM)
//!
//! Solves `op(A) X = alpha * B` where `A` is the lower or upper triangle of a
//! CSR matrix and `B` is a dense column-major matrix overwritten with `X`.
//!
//! [`csrsm_analysis`] orders the rows by dependency level. [`csrsm_solve`]
//! then launches one block per row in that order; a block waits on the
//! completion latch of every row it depends on, so no global barrier between
//! levels is needed.
//!
//! Zero diagonal entries do not stop the solve. The smallest offending row is
//! reported by [`csrsm_zero_pivot`].

pub mod kernel;
pub mod latch;
pub mod levels;

use std::sync::atomic::Ordering;

use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};

use crate::constants::NO_ZERO_PIVOT;
use crate::device::{AtomicScalar, Scalar};
use crate::error::{Result, SparseError};
use crate::handle::{Handle, MatInfo};
use crate::matrix::descr::ensure_non_transposed;
use crate::matrix::{AnalysisPolicy, CsrPattern, CsrRef, FillMode, Operation};

use kernel::{csrsm_kernel, SolveArgs};
pub use kernel::csrsm_block_size;
pub use latch::RowLatch;
pub use levels::{compute_levels, structural_pivot, LevelSchedule};

/// CSRSM analysis data for one fill mode, stored on a [`MatInfo`]
#[derive(Debug, Clone)]
pub struct CsrsmInfo {
    fill_mode: FillMode,
    m: usize,
    nnz: usize,
    schedule: LevelSchedule,
    structural_pivot: Option<i32>,
}

impl CsrsmInfo {
    /// Rows in launch order
    pub fn schedule(&self) -> &LevelSchedule {
        &self.schedule
    }

    /// First row without a diagonal entry (including index base), if any
    pub fn structural_pivot(&self) -> Option<i32> {
        self.structural_pivot
    }

    fn matches(&self, a: &CsrPattern<'_>) -> bool {
        self.m == a.m && self.nnz == a.nnz
    }
}

fn check_square(a: &CsrPattern<'_>) -> Result<()> {
    if a.m != a.n {
        return Err(SparseError::size("n", a.n as i64));
    }
    Ok(())
}

/// Builds the level schedule of `a` for the fill mode of its descriptor
///
/// With [`AnalysisPolicy::Reuse`] an existing analysis for the same fill mode
/// and the same `m` and `nnz` is kept.
pub fn csrsm_analysis(
    handle: &Handle,
    trans_a: Operation,
    trans_b: Operation,
    a: &CsrPattern<'_>,
    policy: AnalysisPolicy,
    info: &mut MatInfo,
) -> Result<()> {
    handle.log_trace(format_args!(
        "csrkit_csrsm_analysis,{:?},{:?},{},{},{:?},{:?}",
        trans_a, trans_b, a.m, a.nnz, a.descr.fill_mode, policy
    ));

    a.descr.ensure_general()?;
    ensure_non_transposed(trans_a)?;
    ensure_non_transposed(trans_b)?;
    check_square(a)?;
    a.validate()?;

    let fill_mode = a.descr.fill_mode;
    let slot = info.csrsm_slot(fill_mode);

    if policy == AnalysisPolicy::Reuse {
        if let Some(existing) = slot.as_ref().filter(|existing| existing.matches(a)) {
            log::debug!(
                "csrsm analysis reused: {:?}, {} levels",
                existing.fill_mode,
                existing.schedule.num_levels()
            );
            return Ok(());
        }
    }

    *slot = None;
    if a.m == 0 {
        return Ok(());
    }

    let schedule = compute_levels(a, fill_mode)?;
    let pivot = structural_pivot(a, a.descr.diag_type);
    log::debug!(
        "csrsm analysis: {:?}, {} rows, {} levels, structural pivot {:?}",
        fill_mode,
        a.m,
        schedule.num_levels(),
        pivot
    );

    *slot = Some(CsrsmInfo {
        fill_mode,
        m: a.m,
        nnz: a.nnz,
        schedule,
        structural_pivot: pivot,
    });
    Ok(())
}

/// Solves `op(A) X = alpha * B`, overwriting `b` with `X`
///
/// # Arguments
///
/// * `handle` - Library handle
/// * `trans_a`, `trans_b` - Operations on A and B (only `Operation::None`)
/// * `nrhs` - Number of right-hand sides (columns of B)
/// * `alpha` - Scalar multiplying B
/// * `a` - Triangular matrix; fill mode and diagonal type come from its descriptor
/// * `b` - Column-major `m x nrhs` matrix with leading dimension `ldb`
/// * `ldb` - Leading dimension of `b`, at least `m`
/// * `info` - Info holding the analysis from [`csrsm_analysis`]
#[allow(clippy::too_many_arguments)]
pub fn csrsm_solve<T: Scalar>(
    handle: &Handle,
    trans_a: Operation,
    trans_b: Operation,
    nrhs: usize,
    alpha: &T,
    a: &CsrRef<'_, T>,
    b: &mut [T],
    ldb: usize,
    info: &MatInfo,
) -> Result<()> {
    let p = &a.pattern;
    handle.log_trace(format_args!(
        "csrkit_{}csrsm_solve,{:?},{:?},{},{},{},{:?},{}",
        T::PREFIX,
        trans_a,
        trans_b,
        p.m,
        nrhs,
        p.nnz,
        alpha,
        ldb
    ));

    p.descr.ensure_general()?;
    ensure_non_transposed(trans_a)?;
    ensure_non_transposed(trans_b)?;
    handle.ensure_wavefront()?;
    check_square(p)?;
    a.validate()?;
    if ldb < p.m.max(1) {
        return Err(SparseError::size("ldb", ldb as i64));
    }
    let b_len = ldb
        .checked_mul(nrhs)
        .ok_or(SparseError::size("nrhs", nrhs as i64))?;
    if b.len() < b_len {
        return Err(SparseError::size("B", b.len() as i64));
    }

    if p.m == 0 || nrhs == 0 {
        info.zero_pivot.store(NO_ZERO_PIVOT, Ordering::Release);
        return Ok(());
    }

    let analysis = info
        .csrsm(p.descr.fill_mode)
        .ok_or(SparseError::InvalidPointer("csrsm info"))?;
    if !analysis.matches(p) {
        return Err(SparseError::InvalidValue(
            "csrsm analysis was built for a different matrix",
        ));
    }

    info.zero_pivot.store(
        analysis.structural_pivot.unwrap_or(NO_ZERO_PIVOT),
        Ordering::Release,
    );

    let m = p.m;
    let to_internal = |err: ndarray::ShapeError| SparseError::Internal(err.to_string());

    // Row-major m x nrhs workspace, one atomic cell per entry.
    let x: Vec<T::Atomic> = {
        let columns = ArrayView2::from_shape((nrhs, ldb), &b[..b_len]).map_err(to_internal)?;
        columns
            .slice(s![.., ..m])
            .t()
            .iter()
            .map(|&v| T::Atomic::new(v))
            .collect()
    };

    let block_size = csrsm_block_size(nrhs);
    let groups = (nrhs + block_size - 1) / block_size;
    let done = latch::latches(m * groups);

    let args = SolveArgs {
        alpha: *alpha,
        a: *a,
        fill_mode: p.descr.fill_mode,
        diag_type: p.descr.diag_type,
        map: &analysis.schedule.map,
        x: &x,
        nrhs,
        done: &done,
        zero_pivot: &info.zero_pivot,
        backoff: handle.spin_backoff(),
    };
    csrsm_kernel(handle.stream(), block_size, &args);

    let solution = Array2::from_shape_vec(
        (m, nrhs),
        x.iter().map(|v| v.load(Ordering::Relaxed)).collect(),
    )
    .map_err(to_internal)?;
    let mut columns = ArrayViewMut2::from_shape((nrhs, ldb), &mut b[..b_len]).map_err(to_internal)?;
    columns.slice_mut(s![.., ..m]).assign(&solution.t());

    if let Some(pivot) = info.zero_pivot() {
        log::debug!("csrsm solve: zero pivot at row {}", pivot);
    }
    Ok(())
}

/// Smallest zero pivot (including index base) found by the last solve
pub fn csrsm_zero_pivot(handle: &Handle, info: &MatInfo) -> Option<i32> {
    handle.log_trace(format_args!("csrkit_csrsm_zero_pivot"));
    info.zero_pivot()
}

/// Drops the CSRSM analysis data of both fill modes
pub fn csrsm_clear(handle: &Handle, info: &mut MatInfo) -> Result<()> {
    handle.log_trace(format_args!("csrkit_csrsm_clear"));
    info.csrsm_lower = None;
    info.csrsm_upper = None;
    Ok(())
}
