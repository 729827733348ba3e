//! Sub-wavefront width selection for the general CSRMV kernel

use crate::error::{Result, SparseError};

/// Lanes cooperating on one row in the general CSR-Vector kernel
///
/// Chosen from the average number of non-zeros per row so that short rows do
/// not leave most lanes idle. Widths never exceed the wavefront.
///
/// # Arguments
///
/// * `wavefront_size` - Lanes per wavefront of the device (32 or 64)
/// * `m` - Number of rows (non-zero)
/// * `nnz` - Number of stored entries
///
/// # Returns
///
/// The sub-wavefront width, or an architecture mismatch for any other
/// wavefront size.
pub fn csrmv_general_width(wavefront_size: u32, m: usize, nnz: usize) -> Result<usize> {
    let nnz_per_row = nnz / m.max(1);

    let width = match wavefront_size {
        32 => match nnz_per_row {
            0..=3 => 2,
            4..=7 => 4,
            8..=15 => 8,
            16..=31 => 16,
            _ => 32,
        },
        64 => match nnz_per_row {
            0..=3 => 2,
            4..=7 => 4,
            8..=15 => 8,
            16..=31 => 16,
            32..=63 => 32,
            _ => 64,
        },
        other => {
            return Err(SparseError::ArchMismatch {
                wavefront_size: other,
            })
        }
    };

    Ok(width)
}
