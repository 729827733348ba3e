//! C ABI
//!
//! Every entry point returns a [`Status`]. Handles, descriptors and infos are
//! opaque heap objects created and destroyed through this module. Enum
//! arguments cross the boundary as `c_int` and are validated; sizes are
//! `c_int` and must be non-negative. Panics never unwind into C: they are
//! reported as [`Status::InternalError`].
//!
//! # Safety
//!
//! Callers must pass pointers that are null or valid for the sizes given
//! alongside them, and must not use an object after destroying it.

#![allow(improper_ctypes_definitions)]

use std::ffi::c_void;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::slice;

use crate::csrgemm::{self, GemmDims};
use crate::csrsm;
use crate::device::{PointerMode, Scalar};
use crate::error::{Result, SparseError, Status};
use crate::handle::{Handle, MatInfo};
use crate::matrix::{
    AnalysisPolicy, CsrMut, CsrPattern, CsrRef, DiagType, FillMode, IndexBase, MatDescr,
    MatrixType, Operation,
};
use crate::spmv;

/// Runs `f`, converting its result and any panic into a status
fn guard<F>(f: F) -> Status
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Status::from(result),
        Err(_) => {
            log::error!("csrkit: panic caught at the C boundary");
            Status::InternalError
        }
    }
}

unsafe fn handle_ref<'a>(handle: *const Handle) -> Result<&'a Handle> {
    handle.as_ref().ok_or(SparseError::InvalidHandle)
}

unsafe fn handle_mut<'a>(handle: *mut Handle) -> Result<&'a mut Handle> {
    handle.as_mut().ok_or(SparseError::InvalidHandle)
}

unsafe fn non_null<'a, T>(ptr: *const T, name: &'static str) -> Result<&'a T> {
    ptr.as_ref().ok_or(SparseError::InvalidPointer(name))
}

unsafe fn non_null_mut<'a, T>(ptr: *mut T, name: &'static str) -> Result<&'a mut T> {
    ptr.as_mut().ok_or(SparseError::InvalidPointer(name))
}

fn size(value: c_int, name: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| SparseError::size(name, value))
}

fn operation(value: c_int) -> Result<Operation> {
    Operation::try_from(value)
}

/// Borrows `len` elements; a null pointer is accepted only when `len == 0`
unsafe fn array<'a, T>(ptr: *const T, len: usize, name: &'static str) -> Result<&'a [T]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(SparseError::InvalidPointer(name));
    }
    Ok(slice::from_raw_parts(ptr, len))
}

unsafe fn array_mut<'a, T>(ptr: *mut T, len: usize, name: &'static str) -> Result<&'a mut [T]> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(SparseError::InvalidPointer(name));
    }
    Ok(slice::from_raw_parts_mut(ptr, len))
}

/// Structure of an `m x n` operand; `None` when its descriptor is null
unsafe fn optional_pattern<'a>(
    m: usize,
    n: usize,
    nnz: c_int,
    descr: *const MatDescr,
    row_ptr: *const i32,
    col_ind: *const i32,
) -> Result<Option<CsrPattern<'a>>> {
    let Some(descr) = descr.as_ref() else {
        return Ok(None);
    };
    let nnz = size(nnz, "nnz")?;
    Ok(Some(CsrPattern::new(
        m,
        n,
        nnz,
        descr,
        array(row_ptr, m + 1, "csr_row_ptr")?,
        array(col_ind, nnz, "csr_col_ind")?,
    )))
}

unsafe fn pattern<'a>(
    m: usize,
    n: usize,
    nnz: c_int,
    descr: *const MatDescr,
    row_ptr: *const i32,
    col_ind: *const i32,
) -> Result<CsrPattern<'a>> {
    optional_pattern(m, n, nnz, descr, row_ptr, col_ind)?
        .ok_or(SparseError::InvalidPointer("descr"))
}

unsafe fn optional_matrix<'a, T>(
    pattern: Option<CsrPattern<'a>>,
    val: *const T,
) -> Result<Option<CsrRef<'a, T>>> {
    match pattern {
        Some(pattern) => Ok(Some(CsrRef {
            pattern,
            val: array(val, pattern.nnz, "csr_val")?,
        })),
        None => Ok(None),
    }
}

// ============================================================================
// HANDLE, DESCRIPTOR AND INFO
// ============================================================================

/// Creates a handle configured from the environment
#[no_mangle]
pub unsafe extern "C" fn csrkit_create_handle(handle: *mut *mut Handle) -> Status {
    guard(|| {
        let out = non_null_mut(handle, "handle")?;
        *out = Box::into_raw(Box::new(Handle::new()?));
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_destroy_handle(handle: *mut Handle) -> Status {
    guard(|| {
        if handle.is_null() {
            return Err(SparseError::InvalidHandle);
        }
        drop(Box::from_raw(handle));
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_set_pointer_mode(handle: *mut Handle, mode: c_int) -> Status {
    guard(|| {
        let handle = handle_mut(handle)?;
        let mode = PointerMode::try_from(mode)
            .map_err(|_| SparseError::InvalidValue("unknown PointerMode"))?;
        handle.set_pointer_mode(mode);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_get_pointer_mode(handle: *const Handle, mode: *mut c_int) -> Status {
    guard(|| {
        let handle = handle_ref(handle)?;
        *non_null_mut(mode, "mode")? = handle.pointer_mode() as c_int;
        Ok(())
    })
}

/// Creates a zero-based general matrix descriptor
#[no_mangle]
pub unsafe extern "C" fn csrkit_create_mat_descr(descr: *mut *mut MatDescr) -> Status {
    guard(|| {
        *non_null_mut(descr, "descr")? = Box::into_raw(Box::new(MatDescr::new()));
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_destroy_mat_descr(descr: *mut MatDescr) -> Status {
    guard(|| {
        if descr.is_null() {
            return Err(SparseError::InvalidPointer("descr"));
        }
        drop(Box::from_raw(descr));
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_set_mat_index_base(descr: *mut MatDescr, base: c_int) -> Status {
    guard(|| {
        non_null_mut(descr, "descr")?.base = IndexBase::try_from(base)?;
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_set_mat_type(descr: *mut MatDescr, matrix_type: c_int) -> Status {
    guard(|| {
        non_null_mut(descr, "descr")?.matrix_type = MatrixType::try_from(matrix_type)?;
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_set_mat_fill_mode(descr: *mut MatDescr, fill_mode: c_int) -> Status {
    guard(|| {
        non_null_mut(descr, "descr")?.fill_mode = FillMode::try_from(fill_mode)?;
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_set_mat_diag_type(descr: *mut MatDescr, diag_type: c_int) -> Status {
    guard(|| {
        non_null_mut(descr, "descr")?.diag_type = DiagType::try_from(diag_type)?;
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_create_mat_info(info: *mut *mut MatInfo) -> Status {
    guard(|| {
        *non_null_mut(info, "info")? = Box::into_raw(Box::new(MatInfo::new()));
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_destroy_mat_info(info: *mut MatInfo) -> Status {
    guard(|| {
        if info.is_null() {
            return Err(SparseError::InvalidPointer("info"));
        }
        drop(Box::from_raw(info));
        Ok(())
    })
}

// ============================================================================
// CSRMV
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn csrkit_csrmv_analysis(
    handle: *const Handle,
    trans: c_int,
    m: c_int,
    n: c_int,
    nnz: c_int,
    descr: *const MatDescr,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    info: *mut MatInfo,
) -> Status {
    guard(|| {
        let handle = handle_ref(handle)?;
        let trans = operation(trans)?;
        let (m, n) = (size(m, "m")?, size(n, "n")?);
        let a = pattern(m, n, nnz, descr, csr_row_ptr, csr_col_ind)?;
        let info = non_null_mut(info, "info")?;
        spmv::csrmv_analysis(handle, trans, &a, info)
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_csrmv_analysis_clear(handle: *const Handle, info: *mut MatInfo) -> Status {
    guard(|| {
        let handle = handle_ref(handle)?;
        spmv::csrmv_analysis_clear(handle, non_null_mut(info, "info")?)
    })
}

#[allow(clippy::too_many_arguments)]
unsafe fn csrmv_raw<T: Scalar>(
    handle: *const Handle,
    trans: c_int,
    m: c_int,
    n: c_int,
    nnz: c_int,
    alpha: *const T,
    descr: *const MatDescr,
    csr_val: *const T,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    info: *const MatInfo,
    x: *const T,
    beta: *const T,
    y: *mut T,
) -> Result<()> {
    let handle = handle_ref(handle)?;
    let trans = operation(trans)?;
    let (m, n) = (size(m, "m")?, size(n, "n")?);
    let a = pattern(m, n, nnz, descr, csr_row_ptr, csr_col_ind)?;
    let a = CsrRef {
        pattern: a,
        val: array(csr_val, a.nnz, "csr_val")?,
    };
    let alpha = non_null(alpha, "alpha")?;
    let beta = non_null(beta, "beta")?;
    let x = array(x, n, "x")?;
    let y = array_mut(y, m, "y")?;
    spmv::csrmv(handle, trans, alpha, &a, x, beta, y, info.as_ref())
}

/// `y := alpha * A * x + beta * y` in single precision; `info` may be null
#[no_mangle]
pub unsafe extern "C" fn csrkit_scsrmv(
    handle: *const Handle,
    trans: c_int,
    m: c_int,
    n: c_int,
    nnz: c_int,
    alpha: *const f32,
    descr: *const MatDescr,
    csr_val: *const f32,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    info: *const MatInfo,
    x: *const f32,
    beta: *const f32,
    y: *mut f32,
) -> Status {
    guard(|| {
        csrmv_raw(
            handle, trans, m, n, nnz, alpha, descr, csr_val, csr_row_ptr, csr_col_ind, info, x,
            beta, y,
        )
    })
}

/// `y := alpha * A * x + beta * y` in double precision; `info` may be null
#[no_mangle]
pub unsafe extern "C" fn csrkit_dcsrmv(
    handle: *const Handle,
    trans: c_int,
    m: c_int,
    n: c_int,
    nnz: c_int,
    alpha: *const f64,
    descr: *const MatDescr,
    csr_val: *const f64,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    info: *const MatInfo,
    x: *const f64,
    beta: *const f64,
    y: *mut f64,
) -> Status {
    guard(|| {
        csrmv_raw(
            handle, trans, m, n, nnz, alpha, descr, csr_val, csr_row_ptr, csr_col_ind, info, x,
            beta, y,
        )
    })
}

// ============================================================================
// CSRGEMM
// ============================================================================

/// Raw CSR operand as passed across the ABI
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CsrOperand<T> {
    pub descr: *const MatDescr,
    pub nnz: c_int,
    pub csr_val: *const T,
    pub csr_row_ptr: *const i32,
    pub csr_col_ind: *const i32,
}

impl<T> CsrOperand<T> {
    unsafe fn pattern<'a>(&self, m: usize, n: usize) -> Result<Option<CsrPattern<'a>>> {
        optional_pattern(m, n, self.nnz, self.descr, self.csr_row_ptr, self.csr_col_ind)
    }

    unsafe fn matrix<'a>(&self, m: usize, n: usize) -> Result<Option<CsrRef<'a, T>>> {
        optional_matrix(self.pattern(m, n)?, self.csr_val)
    }
}

fn gemm_dims(m: c_int, n: c_int, k: c_int) -> Result<GemmDims> {
    Ok(GemmDims::new(size(m, "m")?, size(n, "n")?, size(k, "k")?))
}

#[allow(clippy::too_many_arguments)]
unsafe fn csrgemm_buffer_size_raw<T: Scalar>(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: *const T,
    a: *const CsrOperand<T>,
    b: *const CsrOperand<T>,
    beta: *const T,
    d: *const CsrOperand<T>,
    info: *mut MatInfo,
    buffer_size: *mut usize,
) -> Result<()> {
    let handle = handle_ref(handle)?;
    let (trans_a, trans_b) = (operation(trans_a)?, operation(trans_b)?);
    let dims = gemm_dims(m, n, k)?;
    let a = a.as_ref().map(|a| a.pattern(dims.m, dims.k)).transpose()?.flatten();
    let b = b.as_ref().map(|b| b.pattern(dims.k, dims.n)).transpose()?.flatten();
    let d = d.as_ref().map(|d| d.pattern(dims.m, dims.n)).transpose()?.flatten();
    let info = non_null_mut(info, "info")?;
    let out = non_null_mut(buffer_size, "buffer_size")?;

    *out = csrgemm::csrgemm_buffer_size(
        handle,
        trans_a,
        trans_b,
        dims,
        alpha.as_ref(),
        a.as_ref(),
        b.as_ref(),
        beta.as_ref(),
        d.as_ref(),
        info,
    )?;
    Ok(())
}

/// Records the terms of `C := alpha * A * B + beta * D` (single precision)
///
/// A null `alpha` drops the product, a null `beta` drops the sum.
#[no_mangle]
pub unsafe extern "C" fn csrkit_scsrgemm_buffer_size(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: *const f32,
    a: *const CsrOperand<f32>,
    b: *const CsrOperand<f32>,
    beta: *const f32,
    d: *const CsrOperand<f32>,
    info: *mut MatInfo,
    buffer_size: *mut usize,
) -> Status {
    guard(|| {
        csrgemm_buffer_size_raw(
            handle, trans_a, trans_b, m, n, k, alpha, a, b, beta, d, info, buffer_size,
        )
    })
}

/// Records the terms of `C := alpha * A * B + beta * D` (double precision)
#[no_mangle]
pub unsafe extern "C" fn csrkit_dcsrgemm_buffer_size(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: *const f64,
    a: *const CsrOperand<f64>,
    b: *const CsrOperand<f64>,
    beta: *const f64,
    d: *const CsrOperand<f64>,
    info: *mut MatInfo,
    buffer_size: *mut usize,
) -> Status {
    guard(|| {
        csrgemm_buffer_size_raw(
            handle, trans_a, trans_b, m, n, k, alpha, a, b, beta, d, info, buffer_size,
        )
    })
}

/// Symbolic phase; operand values are not read and may be null
///
/// Operands of either precision may be passed, cast to `CsrOperand<c_void>`.
#[no_mangle]
pub unsafe extern "C" fn csrkit_csrgemm_nnz(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    a: *const CsrOperand<c_void>,
    b: *const CsrOperand<c_void>,
    d: *const CsrOperand<c_void>,
    descr_c: *const MatDescr,
    csr_row_ptr_c: *mut i32,
    nnz_c: *mut c_int,
    info: *const MatInfo,
) -> Status {
    guard(|| {
        let handle = handle_ref(handle)?;
        let (trans_a, trans_b) = (operation(trans_a)?, operation(trans_b)?);
        let dims = gemm_dims(m, n, k)?;
        let a = a.as_ref().map(|a| a.pattern(dims.m, dims.k)).transpose()?.flatten();
        let b = b.as_ref().map(|b| b.pattern(dims.k, dims.n)).transpose()?.flatten();
        let d = d.as_ref().map(|d| d.pattern(dims.m, dims.n)).transpose()?.flatten();
        let descr_c = non_null(descr_c, "descr_C")?;
        let row_ptr_c = array_mut(csr_row_ptr_c, dims.m + 1, "csr_row_ptr_C")?;
        let nnz_c = non_null_mut(nnz_c, "nnz_C")?;
        let info = non_null(info, "info")?;

        let nnz = csrgemm::csrgemm_nnz(
            handle,
            trans_a,
            trans_b,
            dims,
            a.as_ref(),
            b.as_ref(),
            d.as_ref(),
            descr_c,
            row_ptr_c,
            info,
        )?;
        *nnz_c = c_int::try_from(nnz).map_err(|_| SparseError::size("nnz_C", nnz as i64))?;
        Ok(())
    })
}

#[allow(clippy::too_many_arguments)]
unsafe fn csrgemm_raw<T: Scalar>(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: *const T,
    a: *const CsrOperand<T>,
    b: *const CsrOperand<T>,
    beta: *const T,
    d: *const CsrOperand<T>,
    descr_c: *const MatDescr,
    csr_val_c: *mut T,
    csr_row_ptr_c: *const i32,
    csr_col_ind_c: *mut i32,
    info: *const MatInfo,
) -> Result<()> {
    let handle = handle_ref(handle)?;
    let (trans_a, trans_b) = (operation(trans_a)?, operation(trans_b)?);
    let dims = gemm_dims(m, n, k)?;
    let a = a.as_ref().map(|a| a.matrix(dims.m, dims.k)).transpose()?.flatten();
    let b = b.as_ref().map(|b| b.matrix(dims.k, dims.n)).transpose()?.flatten();
    let d = d.as_ref().map(|d| d.matrix(dims.m, dims.n)).transpose()?.flatten();
    let descr_c = non_null(descr_c, "descr_C")?;
    let row_ptr_c = array(csr_row_ptr_c, dims.m + 1, "csr_row_ptr_C")?;
    let info = non_null(info, "info")?;

    let nnz_c = match (row_ptr_c.first(), row_ptr_c.last()) {
        (Some(&first), Some(&last)) => size(last - first, "nnz_C")?,
        _ => 0,
    };
    let c = CsrMut::new(
        dims.m,
        dims.n,
        descr_c,
        row_ptr_c,
        array_mut(csr_col_ind_c, nnz_c, "csr_col_ind_C")?,
        array_mut(csr_val_c, nnz_c, "csr_val_C")?,
    );

    csrgemm::csrgemm(
        handle,
        trans_a,
        trans_b,
        dims,
        alpha.as_ref(),
        a.as_ref(),
        b.as_ref(),
        beta.as_ref(),
        d.as_ref(),
        c,
        info,
    )
}

/// Numeric phase of `C := alpha * A * B + beta * D` (single precision)
#[no_mangle]
pub unsafe extern "C" fn csrkit_scsrgemm(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: *const f32,
    a: *const CsrOperand<f32>,
    b: *const CsrOperand<f32>,
    beta: *const f32,
    d: *const CsrOperand<f32>,
    descr_c: *const MatDescr,
    csr_val_c: *mut f32,
    csr_row_ptr_c: *const i32,
    csr_col_ind_c: *mut i32,
    info: *const MatInfo,
) -> Status {
    guard(|| {
        csrgemm_raw(
            handle, trans_a, trans_b, m, n, k, alpha, a, b, beta, d, descr_c, csr_val_c,
            csr_row_ptr_c, csr_col_ind_c, info,
        )
    })
}

/// Numeric phase of `C := alpha * A * B + beta * D` (double precision)
#[no_mangle]
pub unsafe extern "C" fn csrkit_dcsrgemm(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    n: c_int,
    k: c_int,
    alpha: *const f64,
    a: *const CsrOperand<f64>,
    b: *const CsrOperand<f64>,
    beta: *const f64,
    d: *const CsrOperand<f64>,
    descr_c: *const MatDescr,
    csr_val_c: *mut f64,
    csr_row_ptr_c: *const i32,
    csr_col_ind_c: *mut i32,
    info: *const MatInfo,
) -> Status {
    guard(|| {
        csrgemm_raw(
            handle, trans_a, trans_b, m, n, k, alpha, a, b, beta, d, descr_c, csr_val_c,
            csr_row_ptr_c, csr_col_ind_c, info,
        )
    })
}

// ============================================================================
// CSRSM
// ============================================================================

#[allow(clippy::too_many_arguments)]
unsafe fn csrsm_analysis_raw<T: Scalar>(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    nnz: c_int,
    descr: *const MatDescr,
    csr_val: *const T,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    policy: c_int,
    info: *mut MatInfo,
) -> Result<()> {
    let handle = handle_ref(handle)?;
    let (trans_a, trans_b) = (operation(trans_a)?, operation(trans_b)?);
    let m = size(m, "m")?;
    let a = pattern(m, m, nnz, descr, csr_row_ptr, csr_col_ind)?;
    array(csr_val, a.nnz, "csr_val")?;
    let policy = AnalysisPolicy::try_from(policy)?;
    let info = non_null_mut(info, "info")?;
    csrsm::csrsm_analysis(handle, trans_a, trans_b, &a, policy, info)
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_scsrsm_analysis(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    nnz: c_int,
    descr: *const MatDescr,
    csr_val: *const f32,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    policy: c_int,
    info: *mut MatInfo,
) -> Status {
    guard(|| {
        csrsm_analysis_raw(
            handle, trans_a, trans_b, m, nnz, descr, csr_val, csr_row_ptr, csr_col_ind, policy,
            info,
        )
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_dcsrsm_analysis(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    nnz: c_int,
    descr: *const MatDescr,
    csr_val: *const f64,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    policy: c_int,
    info: *mut MatInfo,
) -> Status {
    guard(|| {
        csrsm_analysis_raw(
            handle, trans_a, trans_b, m, nnz, descr, csr_val, csr_row_ptr, csr_col_ind, policy,
            info,
        )
    })
}

#[allow(clippy::too_many_arguments)]
unsafe fn csrsm_solve_raw<T: Scalar>(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    nrhs: c_int,
    nnz: c_int,
    alpha: *const T,
    descr: *const MatDescr,
    csr_val: *const T,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    b: *mut T,
    ldb: c_int,
    info: *const MatInfo,
) -> Result<()> {
    let handle = handle_ref(handle)?;
    let (trans_a, trans_b) = (operation(trans_a)?, operation(trans_b)?);
    let (m, nrhs) = (size(m, "m")?, size(nrhs, "nrhs")?);
    let ldb = size(ldb, "ldb")?;
    let a = pattern(m, m, nnz, descr, csr_row_ptr, csr_col_ind)?;
    let a = CsrRef {
        pattern: a,
        val: array(csr_val, a.nnz, "csr_val")?,
    };
    let alpha = non_null(alpha, "alpha")?;
    let b_len = ldb
        .checked_mul(nrhs)
        .ok_or(SparseError::size("nrhs", nrhs as i64))?;
    let b = array_mut(b, b_len, "B")?;
    let info = non_null(info, "info")?;
    csrsm::csrsm_solve(handle, trans_a, trans_b, nrhs, alpha, &a, b, ldb, info)
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_scsrsm_solve(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    nrhs: c_int,
    nnz: c_int,
    alpha: *const f32,
    descr: *const MatDescr,
    csr_val: *const f32,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    b: *mut f32,
    ldb: c_int,
    info: *const MatInfo,
) -> Status {
    guard(|| {
        csrsm_solve_raw(
            handle, trans_a, trans_b, m, nrhs, nnz, alpha, descr, csr_val, csr_row_ptr,
            csr_col_ind, b, ldb, info,
        )
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_dcsrsm_solve(
    handle: *const Handle,
    trans_a: c_int,
    trans_b: c_int,
    m: c_int,
    nrhs: c_int,
    nnz: c_int,
    alpha: *const f64,
    descr: *const MatDescr,
    csr_val: *const f64,
    csr_row_ptr: *const i32,
    csr_col_ind: *const i32,
    b: *mut f64,
    ldb: c_int,
    info: *const MatInfo,
) -> Status {
    guard(|| {
        csrsm_solve_raw(
            handle, trans_a, trans_b, m, nrhs, nnz, alpha, descr, csr_val, csr_row_ptr,
            csr_col_ind, b, ldb, info,
        )
    })
}

/// Writes the smallest zero pivot of the last solve, or -1 if there is none
#[no_mangle]
pub unsafe extern "C" fn csrkit_csrsm_zero_pivot(
    handle: *const Handle,
    info: *const MatInfo,
    position: *mut c_int,
) -> Status {
    guard(|| {
        let handle = handle_ref(handle)?;
        let info = non_null(info, "info")?;
        let position = non_null_mut(position, "position")?;
        *position = csrsm::csrsm_zero_pivot(handle, info).unwrap_or(-1);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn csrkit_csrsm_clear(handle: *const Handle, info: *mut MatInfo) -> Status {
    guard(|| {
        let handle = handle_ref(handle)?;
        csrsm::csrsm_clear(handle, non_null_mut(info, "info")?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_null_handle() {
        let mut mode = 0;
        let status = unsafe { csrkit_get_pointer_mode(ptr::null(), &mut mode) };
        assert_eq!(status, Status::InvalidHandle);
    }

    #[test]
    fn test_destroy_null_info() {
        assert_eq!(
            unsafe { csrkit_destroy_mat_info(ptr::null_mut()) },
            Status::InvalidPointer
        );
    }

    #[test]
    fn test_descr_setters_validate_values() {
        let mut descr = ptr::null_mut();
        unsafe {
            assert_eq!(csrkit_create_mat_descr(&mut descr), Status::Success);
            assert_eq!(csrkit_set_mat_index_base(descr, 1), Status::Success);
            assert_eq!(csrkit_set_mat_index_base(descr, 7), Status::InvalidValue);
            assert_eq!(csrkit_set_mat_fill_mode(descr, 1), Status::Success);
            assert_eq!((*descr).base, IndexBase::One);
            assert_eq!((*descr).fill_mode, FillMode::Upper);
            assert_eq!(csrkit_destroy_mat_descr(descr), Status::Success);
        }
    }

    #[test]
    fn test_size_rejects_negative() {
        assert_eq!(size(-1, "m"), Err(SparseError::size("m", -1)));
        assert_eq!(size(3, "m"), Ok(3));
    }
}
