//! # Row-block partitioning for CSR-Adaptive SpMV
//!
//! The partitioner walks the row pointers once and cuts the rows into
//! blocks so that every block carries roughly the same amount of work:
//!
//! - Runs of short rows are packed together until they hold
//!   [`ROW_BLOCK_NNZ`] non-zeros (**CSR-Stream** blocks).
//! - A single row that exceeds the budget on its own gets a block of its own
//!   (**CSR-Vector**), or several blocks if it exceeds
//!   `BLOCK_MULTIPLIER * ROW_BLOCK_NNZ` (**CSR-VectorL**).
//! - Transitions between runs of long rows (> 128 non-zeros) and runs of short
//!   rows (< 32 non-zeros) force a cut so that rows of one block reduce alike.
//!
//! ## Entry layout
//!
//! Each entry packs a row index into the high [`ROW_BITS`] bits. The low
//! [`WG_BITS`] bits of the entry that *starts* a stream block hold the number
//! of lanes that cooperate on each of its rows (zero means one lane per row).
//! For a split long row, the extra entries repeat the row index and carry the
//! piece number in the low bits.
//!
//! The same function serves the sizing pass and the filling pass
//! ([`RowBlockPass`]), so both always agree on the entry count.

use crate::constants::{
    BLOCK_MULTIPLIER, LONG_ROW_THRESHOLD, ROWS_FOR_VECTOR, ROW_BITS, ROW_BLOCK_NNZ,
    SHORT_ROW_THRESHOLD, WG_BITS, WG_MASK, WG_SIZE,
};
use crate::error::{Result, SparseError};

/// Which pass of the partitioner to run
pub enum RowBlockPass<'a> {
    /// Only count the entries
    Size,
    /// Write the entries into a buffer sized by a previous `Size` pass
    Fill(&'a mut [u64]),
}

/// How one row block is processed by the adaptive kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowBlockKind {
    /// Several short rows staged through shared memory
    Stream {
        /// First row of the block
        first_row: usize,
        /// One past the last row of the block
        stop_row: usize,
        /// Lanes reducing each row, zero for one lane per row
        lanes_per_row: usize,
    },
    /// One row reduced by a whole block
    Vector {
        /// The row
        row: usize,
    },
    /// One piece of a row split across several blocks
    VectorLong {
        /// The row
        row: usize,
        /// Piece index within the row
        piece: usize,
        /// Index of the block holding piece zero
        first_block: usize,
    },
}

/// Row-block descriptor produced by the CSRMV analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBlocks {
    entries: Vec<u64>,
}

impl RowBlocks {
    /// Partitions the rows described by `row_ptr` (`m + 1` entries, any base)
    ///
    /// Runs a sizing pass, allocates the descriptor and runs the filling pass.
    ///
    /// # Panics
    ///
    /// Panics if `m` does not fit in [`ROW_BITS`] bits.
    pub fn build(row_ptr: &[i32], m: usize) -> Result<Self> {
        let len = compute_row_blocks(row_ptr, m, RowBlockPass::Size);

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(len)
            .map_err(|_| SparseError::memory::<u64>(len))?;
        entries.resize(len, 0);

        let written = compute_row_blocks(row_ptr, m, RowBlockPass::Fill(&mut entries));
        debug_assert_eq!(written, len);

        Ok(Self { entries })
    }

    /// Raw descriptor entries
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    /// Number of descriptor entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the descriptor is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of blocks the adaptive kernel launches
    pub fn num_blocks(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Decodes block `block` (`0..num_blocks()`)
    pub fn kind(&self, block: usize) -> RowBlockKind {
        let entry = self.entries[block];
        let row = entry_row(entry);
        let stop_row = entry_row(self.entries[block + 1]);
        let low = (entry & WG_MASK) as usize;

        if stop_row > row + ROWS_FOR_VECTOR {
            RowBlockKind::Stream {
                first_row: row,
                stop_row,
                lanes_per_row: low,
            }
        } else if stop_row == row + 1 && low == 0 {
            RowBlockKind::Vector { row }
        } else {
            RowBlockKind::VectorLong {
                row,
                piece: low,
                first_block: block - low,
            }
        }
    }
}

/// Row index stored in a descriptor entry
#[inline]
pub fn entry_row(entry: u64) -> usize {
    (entry >> (64 - ROW_BITS)) as usize
}

#[inline]
fn encode(row: usize, low: u64) -> u64 {
    ((row as u64) << (64 - ROW_BITS)) | low
}

/// Number of lanes that can cooperate on each of `num_rows` rows of one block
///
/// The reduction assumes a power of two: 4 rows get 64 lanes each, 5 rows
/// only 32.
pub fn lanes_for_reduction(num_rows: usize) -> u64 {
    let bits = u64::BITS - ((num_rows as u64).saturating_sub(1)).leading_zeros();
    (WG_SIZE as u64).checked_shr(bits).unwrap_or(0)
}

/// Number of blocks a long row of `row_len` non-zeros is split into
pub fn long_row_pieces(row_len: usize) -> usize {
    let chunk = BLOCK_MULTIPLIER * ROW_BLOCK_NNZ;
    let pieces = (row_len + chunk - 1) / chunk;
    pieces.clamp(1, 1 << WG_BITS)
}

struct Emitter<'a> {
    out: Option<&'a mut [u64]>,
    len: usize,
    last_row: usize,
}

impl<'a> Emitter<'a> {
    fn new(pass: RowBlockPass<'a>) -> Self {
        let out = match pass {
            RowBlockPass::Size => None,
            RowBlockPass::Fill(buf) => Some(buf),
        };
        Self {
            out,
            len: 0,
            last_row: 0,
        }
    }

    fn push(&mut self, row: usize, low: u64) {
        if let Some(out) = self.out.as_deref_mut() {
            out[self.len] = encode(row, low);
        }
        self.len += 1;
        self.last_row = row;
    }

    fn or_last(&mut self, bits: u64) {
        if let Some(out) = self.out.as_deref_mut() {
            out[self.len - 1] |= bits;
        }
    }

    /// Closes the block spanning rows `first..stop`
    fn close(&mut self, first: usize, stop: usize) {
        if stop - first > ROWS_FOR_VECTOR {
            self.or_last(lanes_for_reduction(stop - first));
        }
        self.push(stop, 0);
    }
}

/// Partitions `m` rows into row blocks
///
/// Returns the number of descriptor entries. With [`RowBlockPass::Fill`] the
/// buffer must hold at least the count returned by a [`RowBlockPass::Size`]
/// pass over the same rows.
///
/// # Panics
///
/// Panics if `m` does not fit in [`ROW_BITS`] bits or the fill buffer is too
/// small.
pub fn compute_row_blocks(row_ptr: &[i32], m: usize, pass: RowBlockPass<'_>) -> usize {
    assert!(
        (m as u64) <= (1u64 << ROW_BITS),
        "number of rows {} does not fit in {} bits",
        m,
        ROW_BITS
    );

    let mut out = Emitter::new(pass);
    out.push(0, 0);

    let mut sum = 0usize;
    let mut last_i = 0usize;
    let mut consecutive_long_rows: i32 = 0;

    let mut i = 1usize;
    while i <= m {
        let row_length = (row_ptr[i] - row_ptr[i - 1]) as usize;
        sum += row_length;

        if row_length > LONG_ROW_THRESHOLD {
            consecutive_long_rows += 1;
        } else if consecutive_long_rows > 0 {
            if row_length < SHORT_ROW_THRESHOLD {
                consecutive_long_rows = -1;
            } else {
                consecutive_long_rows += 1;
            }
        }

        // Entering a long-row run: cut the preceding short rows off.
        if consecutive_long_rows == 1 {
            if i - last_i > 1 {
                out.close(last_i, i - 1);
                last_i = i - 1;
                sum = row_length;
            }
        } else if consecutive_long_rows == -1 {
            // First short row after a long-row run.
            out.close(last_i, i - 1);
            last_i = i - 1;
            sum = row_length;
            consecutive_long_rows = 0;
        }

        if i - last_i == 1 && sum > ROW_BLOCK_NNZ {
            // A single row over budget: CSR-Vector or CSR-VectorL.
            let pieces = long_row_pieces(row_length);
            for w in 1..pieces {
                out.push(i - 1, w as u64);
            }
            out.push(i, 0);
            last_i = i;
            sum = 0;
            consecutive_long_rows = 0;
        } else if i - last_i > 1 && sum > ROW_BLOCK_NNZ {
            // This row does not fit; back off and revisit it in the next block.
            i -= 1;
            out.close(last_i, i);
            last_i = i;
            sum = 0;
            consecutive_long_rows = 0;
        } else if sum == ROW_BLOCK_NNZ {
            out.close(last_i, i);
            last_i = i;
            sum = 0;
            consecutive_long_rows = 0;
        }

        i += 1;
    }

    if out.last_row != m {
        out.close(last_i, m);
    }

    out.len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_ptr_from_lengths(lengths: &[usize]) -> Vec<i32> {
        let mut row_ptr = vec![0i32];
        for &len in lengths {
            row_ptr.push(row_ptr.last().unwrap() + len as i32);
        }
        row_ptr
    }

    #[test]
    fn test_lanes_for_reduction() {
        assert_eq!(lanes_for_reduction(2), 128);
        assert_eq!(lanes_for_reduction(4), 64);
        assert_eq!(lanes_for_reduction(5), 32);
        assert_eq!(lanes_for_reduction(256), 1);
        assert_eq!(lanes_for_reduction(257), 0);
        assert_eq!(lanes_for_reduction(1 << 20), 0);
    }

    #[test]
    fn test_long_row_pieces() {
        assert_eq!(long_row_pieces(1025), 1);
        assert_eq!(long_row_pieces(3072), 1);
        assert_eq!(long_row_pieces(3073), 2);
        assert_eq!(long_row_pieces(10_000), 4);
    }

    #[test]
    fn test_three_short_rows_single_block() {
        let row_ptr = row_ptr_from_lengths(&[1, 1, 1]);
        let blocks = RowBlocks::build(&row_ptr, 3).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(entry_row(blocks.entries()[0]), 0);
        assert_eq!(entry_row(blocks.entries()[1]), 3);
        assert_eq!(
            blocks.kind(0),
            RowBlockKind::Stream {
                first_row: 0,
                stop_row: 3,
                lanes_per_row: 64,
            }
        );
    }

    #[test]
    fn test_long_row_split() {
        // Short run, one row of 10_000 non-zeros, short run.
        let row_ptr = row_ptr_from_lengths(&[4, 4, 10_000, 4, 4]);
        let blocks = RowBlocks::build(&row_ptr, 5).unwrap();

        let kinds: Vec<_> = (0..blocks.num_blocks()).map(|b| blocks.kind(b)).collect();
        assert_eq!(
            kinds[0],
            RowBlockKind::Stream {
                first_row: 0,
                stop_row: 2,
                lanes_per_row: 128,
            }
        );
        for piece in 0..4 {
            assert_eq!(
                kinds[1 + piece],
                RowBlockKind::VectorLong {
                    row: 2,
                    piece,
                    first_block: 1,
                }
            );
        }
        assert!(matches!(
            kinds[5],
            RowBlockKind::Stream {
                first_row: 3,
                stop_row: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_single_row_over_budget_is_vector() {
        let row_ptr = row_ptr_from_lengths(&[2000]);
        let blocks = RowBlocks::build(&row_ptr, 1).unwrap();
        assert_eq!(blocks.num_blocks(), 1);
        assert_eq!(blocks.kind(0), RowBlockKind::Vector { row: 0 });
    }

    #[test]
    fn test_exact_budget_cut() {
        let row_ptr = row_ptr_from_lengths(&[512, 512, 8]);
        let blocks = RowBlocks::build(&row_ptr, 3).unwrap();
        let stops: Vec<_> = blocks.entries().iter().map(|&e| entry_row(e)).collect();
        assert_eq!(stops.first(), Some(&0));
        assert_eq!(stops.last(), Some(&3));
        assert!(stops.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_one_based_row_ptr() {
        let zero = row_ptr_from_lengths(&[3, 200, 200, 1, 1, 900]);
        let one: Vec<i32> = zero.iter().map(|p| p + 1).collect();
        assert_eq!(
            RowBlocks::build(&zero, 6).unwrap(),
            RowBlocks::build(&one, 6).unwrap()
        );
    }

    #[test]
    fn test_empty_matrix() {
        let blocks = RowBlocks::build(&[0], 0).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks.num_blocks(), 0);
    }
}
