//! Centralized constants for the csrkit sparse kernels
//!
//! Every launch geometry, threshold and bit layout used by the kernels lives
//! here. Constants are grouped by the routine that consumes them.

// ============================================================================
// DEVICE CONSTANTS
// ============================================================================

/// Wavefront size assumed when nothing else is configured
pub const DEFAULT_WAVEFRONT_SIZE: u32 = 64;

/// Alignment in bytes of block-shared scratch allocations
pub const SHARED_MEMORY_ALIGNMENT: usize = 64;

// ============================================================================
// CSRMV CONSTANTS
// ============================================================================

/// Block size of the general (width-parametrized) CSR-Vector kernel
pub const CSRMV_GENERAL_DIM: usize = 512;

/// Bits of a row-block entry holding the row index
pub const ROW_BITS: u32 = 32;

/// Bits of a row-block entry holding the workgroup / reduction lane count
pub const WG_BITS: u32 = 24;

/// Mask selecting the low `WG_BITS` of a row-block entry
pub const WG_MASK: u64 = (1 << WG_BITS) - 1;

/// Non-zero budget of a single CSR-Stream row block
pub const ROW_BLOCK_NNZ: usize = 1024;

/// Number of `ROW_BLOCK_NNZ` chunks handled by one CSR-VectorL workgroup
pub const BLOCK_MULTIPLIER: usize = 3;

/// Maximum number of rows handled by the CSR-Vector path
pub const ROWS_FOR_VECTOR: usize = 1;

/// Lanes per workgroup of the adaptive kernel
pub const WG_SIZE: usize = 256;

/// Rows longer than this are considered long by the partitioner
pub const LONG_ROW_THRESHOLD: usize = 128;

/// Rows shorter than this end a run of long rows
pub const SHORT_ROW_THRESHOLD: usize = 32;

// ============================================================================
// CSRGEMM CONSTANTS
// ============================================================================

/// Multiplier of the column-index hash
pub const CSRGEMM_HASHVAL: i32 = 79;

/// Number of row groups
pub const CSRGEMM_GROUPS: usize = 8;

/// Block size and grid size of the grouping and max-reduction passes
pub const CSRGEMM_DIM: usize = 256;

/// Lanes per row when counting intermediate products
pub const CSRGEMM_SUB: usize = 8;

/// Inclusive upper bounds (intermediate products) of groups 0..=6 for the symbolic pass
pub const CSRGEMM_NNZ_GROUP_BOUNDS: [usize; CSRGEMM_GROUPS - 1] =
    [32, 64, 512, 1024, 2048, 4096, 8192];

/// Inclusive upper bounds (non-zeros of C) of groups 0..=6 for the numeric pass
pub const CSRGEMM_FILL_GROUP_BOUNDS: [usize; CSRGEMM_GROUPS - 1] =
    [16, 32, 256, 512, 1024, 2048, 4096];

/// Block size of the global-table kernel for the largest rows
pub const CSRGEMM_GLOBAL_DIM: usize = 1024;

/// Sub-wavefront size of the global-table kernel
pub const CSRGEMM_GLOBAL_SUB: usize = 64;

// ============================================================================
// CSRSM CONSTANTS
// ============================================================================

/// Smallest block size (right-hand side lanes) of the triangular solve
pub const CSRSM_MIN_DIM: usize = 64;

/// Largest block size (right-hand side lanes) of the triangular solve
pub const CSRSM_MAX_DIM: usize = 1024;

/// Upper bound of the spin-wait backoff counter
pub const SPIN_BACKOFF_CAP: u32 = 3907;

/// Zero-pivot value meaning "no pivot found"
pub const NO_ZERO_PIVOT: i32 = i32::MAX;
