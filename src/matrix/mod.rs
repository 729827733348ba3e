// Matrix data structures and descriptors

pub mod conversion;
pub mod csr;
pub mod descr;

pub use conversion::{from_sprs_csr, to_sprs_csr};
pub use csr::{CsrMatrix, CsrMut, CsrPattern, CsrRef};
pub use descr::{
    AnalysisPolicy, DiagType, FillMode, IndexBase, MatDescr, MatrixType, Operation,
};
