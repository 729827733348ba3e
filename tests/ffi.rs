//! Round trips through the C ABI

mod common;

use std::ffi::c_void;
use std::os::raw::c_int;
use std::ptr;

use common::*;
use csrkit::ffi::*;
use csrkit::{CsrMatrix, FillMode, Handle, IndexBase, MatDescr, MatInfo, Status};

const NONE: c_int = 111;
const TRANSPOSE: c_int = 112;

/// Owns the opaque objects of one test and destroys them on drop
struct Session {
    handle: *mut Handle,
    info: *mut MatInfo,
}

impl Session {
    fn new() -> Self {
        let mut handle = ptr::null_mut();
        let mut info = ptr::null_mut();
        unsafe {
            assert_eq!(csrkit_create_handle(&mut handle), Status::Success);
            assert_eq!(csrkit_create_mat_info(&mut info), Status::Success);
        }
        Self { handle, info }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        unsafe {
            assert_eq!(csrkit_destroy_mat_info(self.info), Status::Success);
            assert_eq!(csrkit_destroy_handle(self.handle), Status::Success);
        }
    }
}

fn operand<T: Copy + num_traits::Num>(a: &CsrMatrix<T>) -> CsrOperand<T> {
    CsrOperand {
        descr: &a.descr,
        nnz: a.nnz() as c_int,
        csr_val: a.val.as_ptr(),
        csr_row_ptr: a.row_ptr.as_ptr(),
        csr_col_ind: a.col_ind.as_ptr(),
    }
}

fn untyped<T>(op: &CsrOperand<T>) -> *const CsrOperand<c_void> {
    op as *const CsrOperand<T> as *const CsrOperand<c_void>
}

#[test]
fn test_handle_lifecycle() {
    let session = Session::new();
    let mut mode = -1;
    unsafe {
        assert_eq!(csrkit_get_pointer_mode(session.handle, &mut mode), Status::Success);
        assert_eq!(mode, 0);
        assert_eq!(csrkit_set_pointer_mode(session.handle, 1), Status::Success);
        assert_eq!(csrkit_get_pointer_mode(session.handle, &mut mode), Status::Success);
        assert_eq!(mode, 1);
        assert_eq!(csrkit_set_pointer_mode(session.handle, 5), Status::InvalidValue);
        assert_eq!(csrkit_destroy_handle(ptr::null_mut()), Status::InvalidHandle);
        assert_eq!(csrkit_create_handle(ptr::null_mut()), Status::InvalidPointer);
    }
}

#[test]
fn test_dcsrmv_with_and_without_analysis() {
    let session = Session::new();
    let a = generate_random_matrix(300, 200, 25, 1).with_base(IndexBase::One);
    let x = random_vector(200, 2);
    let y0 = random_vector(300, 3);
    let expected = reference_csrmv(2.0, &a, &x, 0.5, &y0);
    let (m, n, nnz) = (a.m as c_int, a.n as c_int, a.nnz() as c_int);

    unsafe {
        let mut y = y0.clone();
        let status = csrkit_dcsrmv(
            session.handle, NONE, m, n, nnz, &2.0, &a.descr, a.val.as_ptr(), a.row_ptr.as_ptr(),
            a.col_ind.as_ptr(), ptr::null(), x.as_ptr(), &0.5, y.as_mut_ptr(),
        );
        assert_eq!(status, Status::Success);
        assert_close(&y, &expected, 1e-10);

        let status = csrkit_csrmv_analysis(
            session.handle, NONE, m, n, nnz, &a.descr, a.row_ptr.as_ptr(), a.col_ind.as_ptr(),
            session.info,
        );
        assert_eq!(status, Status::Success);

        let mut y = y0.clone();
        let status = csrkit_dcsrmv(
            session.handle, NONE, m, n, nnz, &2.0, &a.descr, a.val.as_ptr(), a.row_ptr.as_ptr(),
            a.col_ind.as_ptr(), session.info, x.as_ptr(), &0.5, y.as_mut_ptr(),
        );
        assert_eq!(status, Status::Success);
        assert_close(&y, &expected, 1e-10);

        assert_eq!(csrkit_csrmv_analysis_clear(session.handle, session.info), Status::Success);
    }
}

#[test]
fn test_scsrmv_status_codes() {
    let session = Session::new();
    let a = CsrMatrix::<f32>::identity(4);
    let x = [1.0f32; 4];
    let mut y = [0.0f32; 4];

    unsafe {
        let call = |h: *mut Handle, trans: c_int, m: c_int, x: *const f32, y: *mut f32| {
            csrkit_scsrmv(
                h, trans, m, 4, 4, &1.0, &a.descr, a.val.as_ptr(), a.row_ptr.as_ptr(),
                a.col_ind.as_ptr(), ptr::null(), x, &0.0, y,
            )
        };

        assert_eq!(call(session.handle, NONE, 4, x.as_ptr(), y.as_mut_ptr()), Status::Success);
        assert_eq!(y, [1.0; 4]);
        assert_eq!(call(ptr::null_mut(), NONE, 4, x.as_ptr(), y.as_mut_ptr()), Status::InvalidHandle);
        assert_eq!(call(session.handle, NONE, -1, x.as_ptr(), y.as_mut_ptr()), Status::InvalidSize);
        assert_eq!(call(session.handle, TRANSPOSE, 4, x.as_ptr(), y.as_mut_ptr()), Status::NotImplemented);
        assert_eq!(call(session.handle, 7, 4, x.as_ptr(), y.as_mut_ptr()), Status::InvalidValue);
        assert_eq!(call(session.handle, NONE, 4, ptr::null(), y.as_mut_ptr()), Status::InvalidPointer);
    }
}

#[test]
fn test_dcsrgemm_three_phases() {
    let session = Session::new();
    let a = generate_random_matrix(40, 30, 8, 11).with_base(IndexBase::One);
    let b = generate_random_matrix(30, 50, 8, 12);
    let d = generate_random_matrix(40, 50, 4, 13);
    let expected = reference_spgemm(Some(2.0), Some(&a), Some(&b), Some(-1.0), Some(&d), 40, 50);
    let (op_a, op_b, op_d) = (operand(&a), operand(&b), operand(&d));
    let descr_c = MatDescr::new().with_base(IndexBase::One);

    unsafe {
        let mut buffer_size = 0usize;
        let status = csrkit_dcsrgemm_buffer_size(
            session.handle, NONE, NONE, 40, 50, 30, &2.0, &op_a, &op_b, &-1.0, &op_d,
            session.info, &mut buffer_size,
        );
        assert_eq!(status, Status::Success);
        assert!(buffer_size > 0 && buffer_size % 256 == 0);

        let mut row_ptr = vec![0i32; 41];
        let mut nnz: c_int = 0;
        let status = csrkit_csrgemm_nnz(
            session.handle, NONE, NONE, 40, 50, 30, untyped(&op_a), untyped(&op_b),
            untyped(&op_d), &descr_c, row_ptr.as_mut_ptr(), &mut nnz, session.info,
        );
        assert_eq!(status, Status::Success);
        assert_eq!(nnz as usize, expected.nnz());

        let mut col_ind = vec![0i32; nnz as usize];
        let mut val = vec![0.0f64; nnz as usize];
        let status = csrkit_dcsrgemm(
            session.handle, NONE, NONE, 40, 50, 30, &2.0, &op_a, &op_b, &-1.0, &op_d, &descr_c,
            val.as_mut_ptr(), row_ptr.as_ptr(), col_ind.as_mut_ptr(), session.info,
        );
        assert_eq!(status, Status::Success);

        let c = CsrMatrix { m: 40, n: 50, row_ptr, col_ind, val, descr: descr_c };
        assert_same_matrix(&c, &expected, 1e-12);
    }
}

#[test]
fn test_scsrgemm_add_only_with_null_product() {
    let session = Session::new();
    let d = CsrMatrix::from_triplets(3, 3, &[(0, 0, 1.0f32), (1, 2, 2.0), (2, 1, 3.0)]);
    let op_d = operand(&d);
    let descr_c = MatDescr::new();

    unsafe {
        let mut buffer_size = 0usize;
        let status = csrkit_scsrgemm_buffer_size(
            session.handle, NONE, NONE, 3, 3, 0, ptr::null(), ptr::null(), ptr::null(), &2.0,
            &op_d, session.info, &mut buffer_size,
        );
        assert_eq!(status, Status::Success);

        let mut row_ptr = [0i32; 4];
        let mut nnz: c_int = 0;
        let status = csrkit_csrgemm_nnz(
            session.handle, NONE, NONE, 3, 3, 0, ptr::null(), ptr::null(), untyped(&op_d),
            &descr_c, row_ptr.as_mut_ptr(), &mut nnz, session.info,
        );
        assert_eq!(status, Status::Success);
        assert_eq!(row_ptr, [0, 1, 2, 3]);

        let mut col_ind = [0i32; 3];
        let mut val = [0.0f32; 3];
        let status = csrkit_scsrgemm(
            session.handle, NONE, NONE, 3, 3, 0, ptr::null(), ptr::null(), ptr::null(), &2.0,
            &op_d, &descr_c, val.as_mut_ptr(), row_ptr.as_ptr(), col_ind.as_mut_ptr(),
            session.info,
        );
        assert_eq!(status, Status::Success);
        assert_eq!(col_ind, [0, 2, 1]);
        assert_eq!(val, [2.0, 4.0, 6.0]);

        // Neither scalar given.
        let status = csrkit_scsrgemm_buffer_size(
            session.handle, NONE, NONE, 3, 3, 0, ptr::null(), ptr::null(), ptr::null(),
            ptr::null(), &op_d, session.info, &mut buffer_size,
        );
        assert_eq!(status, Status::InvalidPointer);
    }
}

#[test]
fn test_dcsrsm_solve_and_zero_pivot() {
    let session = Session::new();
    let descr = MatDescr::new().with_fill_mode(FillMode::Upper);
    let a = generate_triangular_matrix(64, FillMode::Upper, 4, 21).with_descr(descr);
    let (nrhs, ldb) = (3, 70);
    let b = random_vector(ldb * nrhs, 22);
    let expected = reference_trsm(&a, FillMode::Upper, a.descr.diag_type, 1.0, &b, nrhs, ldb);

    unsafe {
        let status = csrkit_dcsrsm_analysis(
            session.handle, NONE, NONE, 64, a.nnz() as c_int, &a.descr, a.val.as_ptr(),
            a.row_ptr.as_ptr(), a.col_ind.as_ptr(), 1, session.info,
        );
        assert_eq!(status, Status::Success);

        let mut x = b.clone();
        let status = csrkit_dcsrsm_solve(
            session.handle, NONE, NONE, 64, nrhs as c_int, a.nnz() as c_int, &1.0, &a.descr,
            a.val.as_ptr(), a.row_ptr.as_ptr(), a.col_ind.as_ptr(), x.as_mut_ptr(),
            ldb as c_int, session.info,
        );
        assert_eq!(status, Status::Success);
        assert_close(&x, &expected, 1e-10);

        let mut position: c_int = 0;
        let status = csrkit_csrsm_zero_pivot(session.handle, session.info, &mut position);
        assert_eq!(status, Status::Success);
        assert_eq!(position, -1);

        assert_eq!(csrkit_csrsm_clear(session.handle, session.info), Status::Success);
        let status = csrkit_dcsrsm_solve(
            session.handle, NONE, NONE, 64, nrhs as c_int, a.nnz() as c_int, &1.0, &a.descr,
            a.val.as_ptr(), a.row_ptr.as_ptr(), a.col_ind.as_ptr(), x.as_mut_ptr(),
            ldb as c_int, session.info,
        );
        assert_eq!(status, Status::InvalidPointer);
    }
}

#[test]
fn test_scsrsm_reports_zero_pivot() {
    let session = Session::new();
    let a = CsrMatrix::from_triplets(3, 3, &[(0, 0, 1.0f32), (1, 0, 1.0), (1, 1, 0.0), (2, 2, 4.0)]);

    unsafe {
        let status = csrkit_scsrsm_analysis(
            session.handle, NONE, NONE, 3, 4, &a.descr, a.val.as_ptr(), a.row_ptr.as_ptr(),
            a.col_ind.as_ptr(), 0, session.info,
        );
        assert_eq!(status, Status::Success);

        let mut x = [1.0f32, 1.0, 8.0];
        let status = csrkit_scsrsm_solve(
            session.handle, NONE, NONE, 3, 1, 4, &1.0, &a.descr, a.val.as_ptr(),
            a.row_ptr.as_ptr(), a.col_ind.as_ptr(), x.as_mut_ptr(), 3, session.info,
        );
        assert_eq!(status, Status::Success);
        assert_eq!(x[2], 2.0);

        let mut position: c_int = -1;
        assert_eq!(
            csrkit_csrsm_zero_pivot(session.handle, session.info, &mut position),
            Status::Success
        );
        assert_eq!(position, 1);
    }
}
