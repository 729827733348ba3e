//! Compressed Sparse Row (CSR) matrix storage and views
//!
//! The CSR format stores a sparse matrix using three arrays:
//! - row_ptr: `m + 1` offsets into col_ind and val (shifted by the index base)
//! - col_ind: `nnz` column indices (shifted by the index base)
//! - val: `nnz` values
//!
//! Kernels operate on borrowed views ([`CsrPattern`], [`CsrRef`], [`CsrMut`])
//! over `i32` index buffers, the layout used across the C ABI. [`CsrMatrix`]
//! owns its buffers and is the convenient way to build operands in Rust.

use std::fmt;
use std::ops::Range;

use num_traits::Num;

use crate::error::{Result, SparseError};
use crate::matrix::descr::{IndexBase, MatDescr};

/// A sparse matrix in Compressed Sparse Row (CSR) format owning its buffers
#[derive(Clone)]
pub struct CsrMatrix<T> {
    /// Number of rows in the matrix
    pub m: usize,

    /// Number of columns in the matrix
    pub n: usize,

    /// Row pointers (size: m + 1), offset by the index base
    pub row_ptr: Vec<i32>,

    /// Column indices (size: nnz), offset by the index base
    pub col_ind: Vec<i32>,

    /// Non-zero values (size: nnz)
    pub val: Vec<T>,

    /// Descriptor (index base, type, fill mode, diagonal type)
    pub descr: MatDescr,
}

impl<T> CsrMatrix<T> {
    /// Returns the number of non-zero elements in the matrix
    pub fn nnz(&self) -> usize {
        self.val.len()
    }
}

impl<T> CsrMatrix<T>
where
    T: Copy + Num,
{
    /// Creates a new zero-based CSR matrix
    ///
    /// # Arguments
    ///
    /// * `m` - Number of rows
    /// * `n` - Number of columns
    /// * `row_ptr` - Row pointers
    /// * `col_ind` - Column indices
    /// * `val` - Non-zero values
    ///
    /// # Panics
    ///
    /// Panics if the input arrays are inconsistent:
    /// - row_ptr.len() must be m + 1
    /// - col_ind.len() must equal val.len()
    /// - row_ptr[m] must equal col_ind.len()
    /// - every column index must be in `0..n`
    pub fn new(m: usize, n: usize, row_ptr: Vec<i32>, col_ind: Vec<i32>, val: Vec<T>) -> Self {
        assert_eq!(row_ptr.len(), m + 1, "row_ptr.len() must be m + 1");
        assert_eq!(col_ind.len(), val.len(), "col_ind.len() must equal val.len()");
        assert_eq!(
            row_ptr[m] as usize,
            col_ind.len(),
            "row_ptr[m] must equal col_ind.len()"
        );

        for &col in &col_ind {
            assert!(
                col >= 0 && (col as usize) < n,
                "Column index {} out of bounds (n = {})",
                col,
                n
            );
        }

        Self {
            m,
            n,
            row_ptr,
            col_ind,
            val,
            descr: MatDescr::new(),
        }
    }

    /// Builds a zero-based matrix from `(row, col, value)` triplets
    ///
    /// Rows are sorted by column and duplicate coordinates are summed.
    pub fn from_triplets(m: usize, n: usize, triplets: &[(usize, usize, T)]) -> Self {
        let mut rows: Vec<Vec<(usize, T)>> = vec![Vec::new(); m];
        for &(i, j, v) in triplets {
            assert!(i < m && j < n, "Triplet ({}, {}) out of bounds", i, j);
            rows[i].push((j, v));
        }

        let mut row_ptr = Vec::with_capacity(m + 1);
        let mut col_ind = Vec::with_capacity(triplets.len());
        let mut val = Vec::with_capacity(triplets.len());
        row_ptr.push(0);

        for mut row in rows {
            row.sort_by_key(|&(j, _)| j);
            for (j, v) in row {
                if col_ind.len() > *row_ptr.last().unwrap_or(&0) as usize
                    && col_ind.last() == Some(&(j as i32))
                {
                    if let Some(last) = val.last_mut() {
                        *last = *last + v;
                    }
                } else {
                    col_ind.push(j as i32);
                    val.push(v);
                }
            }
            row_ptr.push(col_ind.len() as i32);
        }

        Self::new(m, n, row_ptr, col_ind, val)
    }

    /// Returns the matrix with its index buffers shifted to `base`
    pub fn with_base(mut self, base: IndexBase) -> Self {
        let shift = base.offset() - self.descr.base.offset();
        if shift != 0 {
            self.row_ptr.iter_mut().for_each(|p| *p += shift);
            self.col_ind.iter_mut().for_each(|c| *c += shift);
        }
        self.descr.base = base;
        self
    }

    /// Returns the matrix with the given descriptor, rebasing indices if needed
    pub fn with_descr(self, descr: MatDescr) -> Self {
        let mut rebased = self.with_base(descr.base);
        rebased.descr = descr;
        rebased
    }

    /// Returns an iterator over the non-zero elements in row i
    ///
    /// Each item is a tuple (zero-based column, value)
    pub fn row_iter(&self, i: usize) -> impl Iterator<Item = (usize, &T)> {
        assert!(i < self.m, "Row index out of bounds");

        let base = self.descr.base.offset();
        let start = (self.row_ptr[i] - base) as usize;
        let end = (self.row_ptr[i + 1] - base) as usize;

        self.col_ind[start..end]
            .iter()
            .zip(&self.val[start..end])
            .map(move |(&col, val)| ((col - base) as usize, val))
    }

    /// Creates an empty matrix with the given dimensions
    pub fn zeros(m: usize, n: usize) -> Self {
        Self::new(m, n, vec![0; m + 1], Vec::new(), Vec::new())
    }

    /// Creates an identity matrix of the given size
    pub fn identity(n: usize) -> Self {
        let row_ptr = (0..=n as i32).collect();
        let col_ind = (0..n as i32).collect();
        let val = vec![T::one(); n];
        Self::new(n, n, row_ptr, col_ind, val)
    }

    /// Borrowed structure of the matrix
    pub fn pattern(&self) -> CsrPattern<'_> {
        CsrPattern {
            m: self.m,
            n: self.n,
            nnz: self.nnz(),
            descr: &self.descr,
            row_ptr: &self.row_ptr,
            col_ind: &self.col_ind,
        }
    }

    /// Borrowed structure and values of the matrix
    pub fn view(&self) -> CsrRef<'_, T> {
        CsrRef {
            pattern: self.pattern(),
            val: &self.val,
        }
    }
}

impl<T: fmt::Debug + Copy + Num> fmt::Debug for CsrMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CsrMatrix {{")?;
        writeln!(f, "  dimensions: {} × {}", self.m, self.n)?;
        writeln!(f, "  nnz: {}", self.nnz())?;
        writeln!(f, "  base: {:?}", self.descr.base)?;

        let max_rows_to_print = 5.min(self.m);
        for i in 0..max_rows_to_print {
            write!(f, "    row {}: ", i)?;
            let entries: Vec<_> = self.row_iter(i).take(5).collect();
            if entries.is_empty() {
                writeln!(f, "(empty)")?;
                continue;
            }
            for (col, val) in &entries {
                write!(f, "({}, {:?}) ", col, val)?;
            }
            writeln!(f)?;
        }
        if self.m > max_rows_to_print {
            writeln!(f, "    ... ({} more rows)", self.m - max_rows_to_print)?;
        }

        write!(f, "}}")
    }
}

/// Borrowed structure of a CSR matrix
#[derive(Debug, Clone, Copy)]
pub struct CsrPattern<'a> {
    /// Number of rows
    pub m: usize,
    /// Number of columns
    pub n: usize,
    /// Number of stored entries
    pub nnz: usize,
    /// Descriptor of the matrix
    pub descr: &'a MatDescr,
    /// Row pointers, at least `m + 1` entries
    pub row_ptr: &'a [i32],
    /// Column indices, at least `nnz` entries
    pub col_ind: &'a [i32],
}

impl<'a> CsrPattern<'a> {
    /// Creates a pattern view
    pub fn new(
        m: usize,
        n: usize,
        nnz: usize,
        descr: &'a MatDescr,
        row_ptr: &'a [i32],
        col_ind: &'a [i32],
    ) -> Self {
        Self {
            m,
            n,
            nnz,
            descr,
            row_ptr,
            col_ind,
        }
    }

    /// Checks that the buffers are long enough for the declared sizes
    pub fn validate(&self) -> Result<()> {
        if self.row_ptr.len() < self.m + 1 {
            return Err(SparseError::size("csr_row_ptr", self.row_ptr.len() as i64));
        }
        if self.col_ind.len() < self.nnz {
            return Err(SparseError::size("csr_col_ind", self.col_ind.len() as i64));
        }
        Ok(())
    }

    /// Index base as an offset
    #[inline]
    pub fn base(&self) -> i32 {
        self.descr.base.offset()
    }

    /// Zero-based positions of row `i` in `col_ind`
    #[inline]
    pub fn row_range(&self, i: usize) -> Range<usize> {
        let base = self.base();
        (self.row_ptr[i] - base) as usize..(self.row_ptr[i + 1] - base) as usize
    }

    /// Number of stored entries in row `i`
    #[inline]
    pub fn row_len(&self, i: usize) -> usize {
        (self.row_ptr[i + 1] - self.row_ptr[i]) as usize
    }

    /// Zero-based column of entry `j`
    #[inline]
    pub fn col(&self, j: usize) -> usize {
        (self.col_ind[j] - self.base()) as usize
    }
}

/// Borrowed structure and values of a CSR matrix
#[derive(Debug, Clone, Copy)]
pub struct CsrRef<'a, T> {
    /// Structure
    pub pattern: CsrPattern<'a>,
    /// Values, at least `nnz` entries
    pub val: &'a [T],
}

impl<'a, T> CsrRef<'a, T> {
    /// Creates a view over raw CSR buffers
    pub fn new(
        m: usize,
        n: usize,
        nnz: usize,
        descr: &'a MatDescr,
        val: &'a [T],
        row_ptr: &'a [i32],
        col_ind: &'a [i32],
    ) -> Self {
        Self {
            pattern: CsrPattern::new(m, n, nnz, descr, row_ptr, col_ind),
            val,
        }
    }

    /// Checks that the buffers are long enough for the declared sizes
    pub fn validate(&self) -> Result<()> {
        self.pattern.validate()?;
        if self.val.len() < self.pattern.nnz {
            return Err(SparseError::size("csr_val", self.val.len() as i64));
        }
        Ok(())
    }
}

/// Output CSR matrix whose row pointers are already known
#[derive(Debug)]
pub struct CsrMut<'a, T> {
    /// Number of rows
    pub m: usize,
    /// Number of columns
    pub n: usize,
    /// Descriptor of the matrix
    pub descr: &'a MatDescr,
    /// Row pointers produced by the symbolic phase
    pub row_ptr: &'a [i32],
    /// Column indices to fill
    pub col_ind: &'a mut [i32],
    /// Values to fill
    pub val: &'a mut [T],
}

impl<'a, T> CsrMut<'a, T> {
    /// Creates an output view
    pub fn new(
        m: usize,
        n: usize,
        descr: &'a MatDescr,
        row_ptr: &'a [i32],
        col_ind: &'a mut [i32],
        val: &'a mut [T],
    ) -> Self {
        Self {
            m,
            n,
            descr,
            row_ptr,
            col_ind,
            val,
        }
    }

    /// Number of entries announced by `row_ptr`
    pub fn nnz(&self) -> usize {
        match (self.row_ptr.first(), self.row_ptr.get(self.m)) {
            (Some(&first), Some(&last)) => (last - first).max(0) as usize,
            _ => 0,
        }
    }
}
