//! Matrix descriptors and operation enums
//!
//! Enum discriminants match the values passed across the C ABI. Raw values
//! coming from C are converted with `TryFrom<i32>`; out-of-range values are
//! rejected.

use crate::error::{Result, SparseError};

macro_rules! impl_try_from_raw {
    ($ty:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl TryFrom<i32> for $ty {
            type Error = SparseError;

            fn try_from(value: i32) -> Result<Self> {
                match value {
                    $($value => Ok($ty::$variant),)+
                    _ => Err(SparseError::InvalidValue(concat!("unknown ", stringify!($ty)))),
                }
            }
        }
    };
}

/// Index base of the index buffers of a CSR matrix
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBase {
    /// Zero-based indexing
    #[default]
    Zero = 0,
    /// One-based indexing
    One = 1,
}

impl IndexBase {
    /// Offset subtracted from stored indices to get zero-based indices
    pub fn offset(&self) -> i32 {
        *self as i32
    }
}

/// Structural class of a matrix
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixType {
    /// General matrix, the only type the kernels accept
    #[default]
    General = 0,
    /// Symmetric matrix
    Symmetric = 1,
    /// Hermitian matrix
    Hermitian = 2,
    /// Triangular matrix
    Triangular = 3,
}

/// Which triangle a triangular solve reads
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Lower triangle (and diagonal)
    #[default]
    Lower = 0,
    /// Upper triangle (and diagonal)
    Upper = 1,
}

/// Whether the diagonal is stored or implicitly one
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagType {
    /// Diagonal entries are read from the matrix
    #[default]
    NonUnit = 0,
    /// Diagonal entries are assumed to be one
    Unit = 1,
}

/// Operation applied to a matrix operand
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    /// op(A) = A
    #[default]
    None = 111,
    /// op(A) = A^T
    Transpose = 112,
    /// op(A) = A^H
    ConjugateTranspose = 113,
}

/// Whether an existing analysis may be reused
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisPolicy {
    /// Keep existing analysis data if it matches the matrix
    #[default]
    Reuse = 0,
    /// Always rebuild the analysis data
    Force = 1,
}

impl_try_from_raw!(IndexBase { Zero = 0, One = 1 });
impl_try_from_raw!(MatrixType { General = 0, Symmetric = 1, Hermitian = 2, Triangular = 3 });
impl_try_from_raw!(FillMode { Lower = 0, Upper = 1 });
impl_try_from_raw!(DiagType { NonUnit = 0, Unit = 1 });
impl_try_from_raw!(Operation { None = 111, Transpose = 112, ConjugateTranspose = 113 });
impl_try_from_raw!(AnalysisPolicy { Reuse = 0, Force = 1 });

/// Properties of a matrix operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatDescr {
    /// Index base of `row_ptr` and `col_ind`
    pub base: IndexBase,
    /// Matrix type
    pub matrix_type: MatrixType,
    /// Fill mode used by triangular routines
    pub fill_mode: FillMode,
    /// Diagonal type used by triangular routines
    pub diag_type: DiagType,
}

impl MatDescr {
    /// Zero-based general matrix
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index base
    pub fn with_base(mut self, base: IndexBase) -> Self {
        self.base = base;
        self
    }

    /// Sets the fill mode
    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    /// Sets the diagonal type
    pub fn with_diag_type(mut self, diag_type: DiagType) -> Self {
        self.diag_type = diag_type;
        self
    }

    /// Sets the matrix type
    pub fn with_matrix_type(mut self, matrix_type: MatrixType) -> Self {
        self.matrix_type = matrix_type;
        self
    }

    /// Fails with "not implemented" for anything but a general matrix
    pub fn ensure_general(&self) -> Result<()> {
        match self.matrix_type {
            MatrixType::General => Ok(()),
            _ => Err(SparseError::NotImplemented("only general matrices are supported")),
        }
    }
}

/// Fails with "not implemented" for anything but the non-transposed operation
pub(crate) fn ensure_non_transposed(op: Operation) -> Result<()> {
    match op {
        Operation::None => Ok(()),
        _ => Err(SparseError::NotImplemented("transposed operands are not supported")),
    }
}
