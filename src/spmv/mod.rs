//! # Sparse matrix-vector multiplication (CSRMV)
//!
//! Computes `y := alpha * A * x + beta * y` for a general CSR matrix.
//!
//! ## Dispatch
//!
//! - Without analysis data the general kernel runs with a sub-wavefront width
//!   chosen from the average row length ([`csrmv_general_width`]).
//! - After [`csrmv_analysis`] the adaptive kernel runs over the cached
//!   [`RowBlocks`] descriptor, balancing short and long rows.
//!
//! Both paths produce the same result up to floating-point summation order.

pub mod kernels;
pub mod row_blocks;
pub mod width;

use crate::device::memory::GlobalMut;
use crate::device::{PointerMode, Scalar};
use crate::error::{Result, SparseError};
use crate::handle::{Handle, MatInfo};
use crate::matrix::descr::ensure_non_transposed;
use crate::matrix::{CsrPattern, CsrRef, Operation};

use kernels::{csrmv_adaptive, csrmv_general, SpmvArgs};
pub use row_blocks::{compute_row_blocks, RowBlockKind, RowBlockPass, RowBlocks};
pub use width::csrmv_general_width;

/// CSRMV analysis data stored on a [`MatInfo`]
#[derive(Debug, Clone)]
pub struct CsrmvInfo {
    trans: Operation,
    m: usize,
    n: usize,
    nnz: usize,
    blocks: RowBlocks,
}

impl CsrmvInfo {
    /// Row-block descriptor
    pub fn row_blocks(&self) -> &RowBlocks {
        &self.blocks
    }

    fn check(&self, trans: Operation, a: &CsrPattern<'_>) -> Result<()> {
        if self.trans != trans || self.m != a.m || self.n != a.n || self.nnz != a.nnz {
            return Err(SparseError::InvalidValue(
                "csrmv analysis was built for a different matrix",
            ));
        }
        Ok(())
    }
}

/// Builds the row-block descriptor for `a` and stores it on `info`
///
/// Any previous CSRMV analysis on `info` is dropped first. Empty matrices
/// leave `info` without analysis data.
///
/// # Arguments
///
/// * `handle` - Library handle
/// * `trans` - Operation applied to `a` (only `Operation::None`)
/// * `a` - Structure of the matrix
/// * `info` - Info receiving the analysis data
pub fn csrmv_analysis(
    handle: &Handle,
    trans: Operation,
    a: &CsrPattern<'_>,
    info: &mut MatInfo,
) -> Result<()> {
    handle.log_trace(format_args!(
        "csrkit_csrmv_analysis,{:?},{},{},{}",
        trans, a.m, a.n, a.nnz
    ));

    a.descr.ensure_general()?;
    ensure_non_transposed(trans)?;
    a.validate()?;

    info.csrmv = None;

    if a.m == 0 || a.n == 0 || a.nnz == 0 {
        return Ok(());
    }

    let blocks = RowBlocks::build(a.row_ptr, a.m)?;
    log::debug!(
        "csrmv analysis: {} rows, {} non-zeros -> {} row blocks",
        a.m,
        a.nnz,
        blocks.num_blocks()
    );

    info.csrmv = Some(CsrmvInfo {
        trans,
        m: a.m,
        n: a.n,
        nnz: a.nnz,
        blocks,
    });
    Ok(())
}

/// Drops the CSRMV analysis data of `info`
pub fn csrmv_analysis_clear(handle: &Handle, info: &mut MatInfo) -> Result<()> {
    handle.log_trace(format_args!("csrkit_csrmv_analysis_clear"));
    info.csrmv = None;
    Ok(())
}

/// Sparse matrix-vector multiplication `y := alpha * op(A) * x + beta * y`
///
/// # Arguments
///
/// * `handle` - Library handle
/// * `trans` - Operation applied to `a` (only `Operation::None`)
/// * `alpha` - Scalar multiplying `A * x`
/// * `a` - The matrix
/// * `x` - Dense vector of at least `n` entries
/// * `beta` - Scalar multiplying `y`
/// * `y` - Dense vector of at least `m` entries, updated in place
/// * `info` - Analysis data from [`csrmv_analysis`]; `None` selects the general kernel
///
/// # Returns
///
/// `Ok(())` on success. Validation failures leave `y` untouched. An empty
/// matrix (`m`, `n` or `nnz` zero) returns immediately without touching `y`.
#[allow(clippy::too_many_arguments)]
pub fn csrmv<T: Scalar>(
    handle: &Handle,
    trans: Operation,
    alpha: &T,
    a: &CsrRef<'_, T>,
    x: &[T],
    beta: &T,
    y: &mut [T],
    info: Option<&MatInfo>,
) -> Result<()> {
    let p = &a.pattern;
    handle.log_trace(format_args!(
        "csrkit_{}csrmv,{:?},{},{},{},{:?}",
        T::PREFIX,
        trans,
        p.m,
        p.n,
        p.nnz,
        handle.pointer_mode()
    ));

    p.descr.ensure_general()?;
    ensure_non_transposed(trans)?;
    handle.ensure_wavefront()?;
    a.validate()?;
    if x.len() < p.n {
        return Err(SparseError::size("x", x.len() as i64));
    }
    if y.len() < p.m {
        return Err(SparseError::size("y", y.len() as i64));
    }

    if p.m == 0 || p.n == 0 || p.nnz == 0 {
        return Ok(());
    }

    if handle.pointer_mode() == PointerMode::Host && *alpha == T::zero() && *beta == T::one() {
        return Ok(());
    }

    let args = SpmvArgs {
        alpha,
        a: *a,
        x,
        beta,
    };
    let y = GlobalMut::new(y);

    match info.and_then(MatInfo::csrmv) {
        Some(mv) => {
            mv.check(trans, p)?;
            csrmv_adaptive(handle.stream(), &mv.blocks, &args, &y);
        }
        None => {
            let width = csrmv_general_width(handle.wavefront_size(), p.m, p.nnz)?;
            csrmv_general(handle.stream(), width, &args, &y);
        }
    }

    Ok(())
}
