//! # Sparse matrix-matrix multiplication (CSRGEMM)
//!
//! Computes `C := alpha * A * B + beta * D` for general CSR matrices in two
//! phases:
//!
//! 1. [`csrgemm_nnz`] counts the non-zeros of every row of C and fills its
//!    row pointers.
//! 2. [`csrgemm`] computes the column indices and values, each row sorted by
//!    column.
//!
//! Both phases bucket the rows of C into groups ([`group`]) and run a kernel
//! sized for each group ([`kernels`]). [`csrgemm_buffer_size`] must run first:
//! it records which of the two terms take part in the computation.

pub mod group;
pub mod hash;
pub mod kernels;

use std::mem::size_of;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::constants::{
    CSRGEMM_DIM, CSRGEMM_FILL_GROUP_BOUNDS, CSRGEMM_GROUPS, CSRGEMM_NNZ_GROUP_BOUNDS,
};
use crate::device::memory::GlobalMut;
use crate::device::Scalar;
use crate::error::{Result, SparseError};
use crate::handle::{Handle, MatInfo};
use crate::matrix::descr::ensure_non_transposed;
use crate::matrix::{CsrMut, CsrPattern, CsrRef, MatDescr, Operation};

use group::{group_rows, intermediate_products, max_metric, RowGroups};
use kernels::{
    csrgemm_copy_row_ptr, csrgemm_copy_scale, csrgemm_fill_group, csrgemm_nnz_group, FillTarget,
    Rows, TermPatterns, TermValues,
};
pub use kernels::{GroupKernel, KernelShape, GROUP_KERNELS};

/// Terms of `C := alpha * A * B + beta * D` selected by the buffer-size query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrgemmInfo {
    /// `alpha * A * B` takes part
    pub mul: bool,
    /// `beta * D` takes part
    pub add: bool,
}

/// Problem dimensions: `A` is `m x k`, `B` is `k x n`, `C` and `D` are `m x n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemmDims {
    /// Rows of `A`, `C` and `D`
    pub m: usize,
    /// Columns of `B`, `C` and `D`
    pub n: usize,
    /// Columns of `A` and rows of `B`
    pub k: usize,
}

impl GemmDims {
    /// Dimensions of `C := A * B + D` with `A` of size `m x k`
    pub fn new(m: usize, n: usize, k: usize) -> Self {
        Self { m, n, k }
    }
}

/// Checks the operands of the enabled terms and returns the effective ones
///
/// The product is dropped when `k`, `nnz(A)` or `nnz(B)` is zero; the sum is
/// dropped when `nnz(D)` is zero.
fn effective_terms<'a>(
    dims: GemmDims,
    flags: CsrgemmInfo,
    a: Option<&CsrPattern<'a>>,
    b: Option<&CsrPattern<'a>>,
    d: Option<&CsrPattern<'a>>,
) -> Result<TermPatterns<'a>> {
    let mut terms = TermPatterns::default();

    if flags.mul {
        let a = a.ok_or(SparseError::InvalidPointer("A"))?;
        let b = b.ok_or(SparseError::InvalidPointer("B"))?;
        a.descr.ensure_general()?;
        b.descr.ensure_general()?;
        if a.m != dims.m || a.n != dims.k {
            return Err(SparseError::size("A", a.m as i64));
        }
        if b.m != dims.k || b.n != dims.n {
            return Err(SparseError::size("B", b.m as i64));
        }
        a.validate()?;
        b.validate()?;
        if dims.k > 0 && a.nnz > 0 && b.nnz > 0 {
            terms.ab = Some((*a, *b));
        }
    }

    if flags.add {
        let d = d.ok_or(SparseError::InvalidPointer("D"))?;
        d.descr.ensure_general()?;
        if d.m != dims.m || d.n != dims.n {
            return Err(SparseError::size("D", d.m as i64));
        }
        d.validate()?;
        if d.nnz > 0 {
            terms.d = Some(*d);
        }
    }

    Ok(terms)
}

/// Rows a group kernel runs over; all rows in order when grouping is moot
fn group_rows_of<'g>(groups: &'g RowGroups, g: usize) -> Rows<'g> {
    match groups.single_group() {
        Some(only) if only == g && GROUP_KERNELS[g].shape == KernelShape::WfPerRow => {
            Rows::All(groups.total_rows())
        }
        _ => Rows::Subset(groups.rows(g)),
    }
}

fn log_groups(phase: &str, groups: &RowGroups) {
    log::debug!(
        "csrgemm {}: {} rows, group sizes {:?}",
        phase,
        groups.total_rows(),
        groups.sizes
    );
}

/// Records the terms of `C := alpha * A * B + beta * D` and sizes the workspace
///
/// `alpha` enables the product and requires `a` and `b`; `beta` enables the
/// sum and requires `d`. At least one of them must be given. The flags are
/// stored on `info` for [`csrgemm_nnz`] and [`csrgemm`].
///
/// # Returns
///
/// The workspace size in bytes. The workspace is allocated internally by the
/// later phases; the value is informational.
#[allow(clippy::too_many_arguments)]
pub fn csrgemm_buffer_size<T: Scalar>(
    handle: &Handle,
    trans_a: Operation,
    trans_b: Operation,
    dims: GemmDims,
    alpha: Option<&T>,
    a: Option<&CsrPattern<'_>>,
    b: Option<&CsrPattern<'_>>,
    beta: Option<&T>,
    d: Option<&CsrPattern<'_>>,
    info: &mut MatInfo,
) -> Result<usize> {
    handle.log_trace(format_args!(
        "csrkit_{}csrgemm_buffer_size,{:?},{:?},{},{},{},{:?},{:?}",
        T::PREFIX,
        trans_a,
        trans_b,
        dims.m,
        dims.n,
        dims.k,
        alpha,
        beta
    ));

    if alpha.is_none() && beta.is_none() {
        return Err(SparseError::InvalidPointer("alpha and beta"));
    }
    if alpha.is_some() {
        ensure_non_transposed(trans_a)?;
        ensure_non_transposed(trans_b)?;
    }

    let flags = CsrgemmInfo {
        mul: alpha.is_some(),
        add: beta.is_some(),
    };
    effective_terms(dims, flags, a, b, d)?;

    info.csrgemm = Some(flags);

    // Group counters, permutation and per-row counts, rounded up to 256 bytes.
    let bytes = CSRGEMM_DIM * CSRGEMM_GROUPS * size_of::<usize>()
        + dims.m * (size_of::<i32>() + size_of::<u8>() + size_of::<usize>());
    Ok(((bytes - 1) / 256 + 1) * 256)
}

/// Symbolic phase: fills `row_ptr_c` and returns the number of non-zeros of C
///
/// # Arguments
///
/// * `handle` - Library handle
/// * `trans_a`, `trans_b` - Operations on A and B (only `Operation::None`)
/// * `dims` - Problem dimensions
/// * `a`, `b` - Structure of the product operands, required when the product is enabled
/// * `d` - Structure of the addend, required when the sum is enabled
/// * `descr_c` - Descriptor of C (general, any index base)
/// * `row_ptr_c` - Output row pointers, at least `m + 1` entries
/// * `info` - Info holding the flags from [`csrgemm_buffer_size`]
#[allow(clippy::too_many_arguments)]
pub fn csrgemm_nnz(
    handle: &Handle,
    trans_a: Operation,
    trans_b: Operation,
    dims: GemmDims,
    a: Option<&CsrPattern<'_>>,
    b: Option<&CsrPattern<'_>>,
    d: Option<&CsrPattern<'_>>,
    descr_c: &MatDescr,
    row_ptr_c: &mut [i32],
    info: &MatInfo,
) -> Result<usize> {
    handle.log_trace(format_args!(
        "csrkit_csrgemm_nnz,{:?},{:?},{},{},{}",
        trans_a, trans_b, dims.m, dims.n, dims.k
    ));

    let flags = *info
        .csrgemm()
        .ok_or(SparseError::InvalidPointer("csrgemm info"))?;
    if flags.mul {
        ensure_non_transposed(trans_a)?;
        ensure_non_transposed(trans_b)?;
    }
    descr_c.ensure_general()?;
    handle.ensure_wavefront()?;
    let terms = effective_terms(dims, flags, a, b, d)?;
    if row_ptr_c.len() < dims.m + 1 {
        return Err(SparseError::size("csr_row_ptr_C", row_ptr_c.len() as i64));
    }

    let base_c = descr_c.base.offset();
    let stream = handle.stream();

    match (&terms.ab, &terms.d) {
        _ if dims.m == 0 || dims.n == 0 => {
            row_ptr_c[..=dims.m].fill(base_c);
            return Ok(0);
        }
        (None, None) => {
            row_ptr_c[..=dims.m].fill(base_c);
            return Ok(0);
        }
        (None, Some(d)) => {
            csrgemm_copy_row_ptr(stream, d, base_c, row_ptr_c);
            return Ok(d.nnz);
        }
        (Some(_), _) => {}
    }

    let products = intermediate_products(
        stream,
        dims.m,
        terms.ab.as_ref().map(|(a, _)| a),
        terms.ab.as_ref().map(|(_, b)| b),
        terms.d.as_ref(),
    );
    let groups = group_rows(stream, dims.m, &CSRGEMM_NNZ_GROUP_BOUNDS, |row| products[row])?;
    log_groups("nnz", &groups);

    let row_nnz: Vec<AtomicI32> = (0..dims.m).map(|_| AtomicI32::new(0)).collect();
    for (g, kernel) in GROUP_KERNELS.iter().enumerate() {
        if groups.sizes[g] == 0 {
            continue;
        }
        let kernel = kernel.for_device(handle.wavefront_size());
        let capacity = if kernel.hash == 0 {
            let max_products = max_metric(stream, groups.rows(g), |row| products[row]);
            (2 * max_products.min(dims.n)).next_power_of_two()
        } else {
            kernel.hash
        };
        csrgemm_nnz_group(
            stream,
            &kernel,
            capacity,
            &terms,
            dims.n,
            group_rows_of(&groups, g),
            &row_nnz,
        );
    }

    // Row pointers are the exclusive prefix sum of the row counts.
    let mut nnz: i64 = 0;
    row_ptr_c[0] = base_c;
    for (i, count) in row_nnz.iter().enumerate() {
        nnz += i64::from(count.load(Ordering::Relaxed));
        row_ptr_c[i + 1] = i32::try_from(nnz + i64::from(base_c))
            .map_err(|_| SparseError::size("nnz_C", nnz))?;
    }

    Ok(nnz as usize)
}

/// Numeric phase: fills the column indices and values of C
///
/// `c.row_ptr` must come from [`csrgemm_nnz`] for the same operands. Every
/// row of C is written sorted by column.
#[allow(clippy::too_many_arguments)]
pub fn csrgemm<T: Scalar>(
    handle: &Handle,
    trans_a: Operation,
    trans_b: Operation,
    dims: GemmDims,
    alpha: Option<&T>,
    a: Option<&CsrRef<'_, T>>,
    b: Option<&CsrRef<'_, T>>,
    beta: Option<&T>,
    d: Option<&CsrRef<'_, T>>,
    c: CsrMut<'_, T>,
    info: &MatInfo,
) -> Result<()> {
    handle.log_trace(format_args!(
        "csrkit_{}csrgemm,{:?},{:?},{},{},{},{:?},{:?}",
        T::PREFIX,
        trans_a,
        trans_b,
        dims.m,
        dims.n,
        dims.k,
        alpha,
        beta
    ));

    let flags = *info
        .csrgemm()
        .ok_or(SparseError::InvalidPointer("csrgemm info"))?;
    if flags.mul {
        ensure_non_transposed(trans_a)?;
        ensure_non_transposed(trans_b)?;
    }
    c.descr.ensure_general()?;
    handle.ensure_wavefront()?;

    let alpha = match (flags.mul, alpha) {
        (true, None) => return Err(SparseError::InvalidPointer("alpha")),
        (_, alpha) => alpha.copied().unwrap_or_else(T::zero),
    };
    let beta = match (flags.add, beta) {
        (true, None) => return Err(SparseError::InvalidPointer("beta")),
        (_, beta) => beta.copied().unwrap_or_else(T::zero),
    };

    let terms = effective_terms(
        dims,
        flags,
        a.map(|a| &a.pattern),
        b.map(|b| &b.pattern),
        d.map(|d| &d.pattern),
    )?;
    if let Some(a) = a.filter(|_| flags.mul) {
        a.validate()?;
    }
    if let Some(b) = b.filter(|_| flags.mul) {
        b.validate()?;
    }
    if let Some(d) = d.filter(|_| flags.add) {
        d.validate()?;
    }

    if c.m != dims.m || c.n != dims.n {
        return Err(SparseError::size("C", c.m as i64));
    }
    if c.row_ptr.len() < dims.m + 1 {
        return Err(SparseError::size("csr_row_ptr_C", c.row_ptr.len() as i64));
    }
    let nnz_c = c.nnz();
    if c.col_ind.len() < nnz_c {
        return Err(SparseError::size("csr_col_ind_C", c.col_ind.len() as i64));
    }
    if c.val.len() < nnz_c {
        return Err(SparseError::size("csr_val_C", c.val.len() as i64));
    }

    if dims.m == 0 || dims.n == 0 || nnz_c == 0 {
        return Ok(());
    }

    let values = TermValues {
        mul: match (a, b) {
            (Some(a), Some(b)) if terms.ab.is_some() => Some((alpha, *a, *b)),
            _ => None,
        },
        add: match d {
            Some(d) if terms.d.is_some() => Some((beta, *d)),
            _ => None,
        },
    };

    let stream = handle.stream();
    let base_c = c.descr.base.offset();
    let row_ptr_c = c.row_ptr;
    let col_ind = GlobalMut::new(c.col_ind);
    let val = GlobalMut::new(c.val);

    match (&values.mul, &values.add) {
        (None, None) => return Ok(()),
        (None, Some((beta, d))) => {
            csrgemm_copy_scale(stream, *beta, d, base_c, &col_ind, &val);
            return Ok(());
        }
        (Some(_), _) => {}
    }

    let row_len = |row: usize| (row_ptr_c[row + 1] - row_ptr_c[row]) as usize;
    let groups = group_rows(stream, dims.m, &CSRGEMM_FILL_GROUP_BOUNDS, row_len)?;
    log_groups("fill", &groups);

    let out = FillTarget {
        row_ptr: row_ptr_c,
        base: base_c,
        col_ind: &col_ind,
        val: &val,
    };
    for (g, kernel) in GROUP_KERNELS.iter().enumerate() {
        if groups.sizes[g] == 0 {
            continue;
        }
        let kernel = kernel.for_device(handle.wavefront_size());
        let capacity = if kernel.hash == 0 {
            (2 * max_metric(stream, groups.rows(g), row_len)).next_power_of_two()
        } else {
            kernel.hash
        };
        csrgemm_fill_group(
            stream,
            &kernel,
            capacity,
            &values,
            dims.n,
            group_rows_of(&groups, g),
            &out,
        );
    }

    Ok(())
}
