//! Conversions between [`CsrMatrix`] and `sprs` matrices

use num_traits::Num;
use sprs::CsMat;

use crate::error::{Result, SparseError};
use crate::matrix::CsrMatrix;

/// Converts a CSR matrix (any index base) to a sprs `CsMat` in CSR storage
///
/// Rows must be sorted by column without duplicates, as sprs requires.
pub fn to_sprs_csr<T>(matrix: &CsrMatrix<T>) -> Result<CsMat<T>>
where
    T: Copy + Num + Default,
{
    let base = matrix.descr.base.offset();
    let indptr = matrix.row_ptr.iter().map(|&p| (p - base) as usize).collect();
    let indices = matrix.col_ind.iter().map(|&c| (c - base) as usize).collect();

    CsMat::try_new((matrix.m, matrix.n), indptr, indices, matrix.val.clone())
        .map_err(|_| SparseError::InvalidValue("matrix structure rejected by sprs"))
}

/// Converts a sprs matrix to a zero-based [`CsrMatrix`]
///
/// CSC input is converted to CSR first. Fails with an invalid size if the
/// matrix does not fit `i32` indices.
pub fn from_sprs_csr<T>(matrix: CsMat<T>) -> Result<CsrMatrix<T>>
where
    T: Copy + Num + Default,
{
    let matrix = if matrix.is_csr() {
        matrix
    } else {
        matrix.to_csr()
    };

    let (m, n) = matrix.shape();
    if matrix.nnz() > i32::MAX as usize || n > i32::MAX as usize {
        return Err(SparseError::size("nnz", matrix.nnz() as i64));
    }

    let (indptr, indices, data) = matrix.into_raw_storage();
    let first = indptr.first().copied().unwrap_or(0);
    let row_ptr = indptr.iter().map(|&p| (p - first) as i32).collect();
    let col_ind = indices.iter().map(|&c| c as i32).collect();

    Ok(CsrMatrix::new(m, n, row_ptr, col_ind, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::IndexBase;

    #[test]
    fn test_one_based_to_sprs() {
        let matrix = CsrMatrix::new(2, 3, vec![0, 2, 3], vec![0, 2, 1], vec![1.0, 2.0, 3.0])
            .with_base(IndexBase::One);

        let sp = to_sprs_csr(&matrix).unwrap();
        assert_eq!(sp.shape(), (2, 3));
        assert_eq!(sp.get(0, 2), Some(&2.0));
        assert_eq!(sp.get(1, 1), Some(&3.0));
    }

    #[test]
    fn test_from_sprs_csc_input() {
        let csr = CsMat::new((2, 2), vec![0, 1, 2], vec![1, 0], vec![5.0, 7.0]);
        let csc = csr.to_csc();

        let matrix = from_sprs_csr(csc).unwrap();
        assert_eq!(matrix.row_ptr, vec![0, 1, 2]);
        assert_eq!(matrix.col_ind, vec![1, 0]);
        assert_eq!(matrix.val, vec![5.0, 7.0]);
    }
}
