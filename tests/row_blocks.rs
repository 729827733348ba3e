//! Property tests for the CSRMV row-block partition

use csrkit::spmv::row_blocks::{entry_row, long_row_pieces};
use csrkit::spmv::{compute_row_blocks, RowBlockKind, RowBlockPass, RowBlocks};
use proptest::prelude::*;

fn row_ptr_from_lengths(lengths: &[usize]) -> Vec<i32> {
    let mut row_ptr = Vec::with_capacity(lengths.len() + 1);
    row_ptr.push(0i32);
    for &len in lengths {
        row_ptr.push(row_ptr[row_ptr.len() - 1] + len as i32);
    }
    row_ptr
}

/// Row lengths mixing short rows, medium rows and the odd very long row
fn row_lengths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(
        prop_oneof![
            8 => 0usize..40,
            3 => 100usize..600,
            1 => 1000usize..12_000,
        ],
        0..400,
    )
}

#[test]
fn test_blocks_cover_every_row_once() {
    let lengths = [3, 3, 300, 300, 5000, 1, 1, 1, 1024, 0, 0, 2];
    let row_ptr = row_ptr_from_lengths(&lengths);
    let blocks = RowBlocks::build(&row_ptr, lengths.len()).unwrap();

    let mut owned = vec![0usize; lengths.len()];
    for b in 0..blocks.num_blocks() {
        match blocks.kind(b) {
            RowBlockKind::Stream {
                first_row,
                stop_row,
                ..
            } => (first_row..stop_row).for_each(|r| owned[r] += 1),
            RowBlockKind::Vector { row } => owned[row] += 1,
            RowBlockKind::VectorLong { row, piece, .. } => {
                if piece == 0 {
                    owned[row] += 1;
                }
            }
        }
    }
    assert!(owned.iter().all(|&count| count == 1), "{:?}", owned);
}

proptest! {
    #[test]
    fn prop_size_pass_matches_fill_pass(lengths in row_lengths()) {
        let row_ptr = row_ptr_from_lengths(&lengths);
        let m = lengths.len();

        let size = compute_row_blocks(&row_ptr, m, RowBlockPass::Size);
        let mut entries = vec![0u64; size];
        let written = compute_row_blocks(&row_ptr, m, RowBlockPass::Fill(&mut entries));
        prop_assert_eq!(size, written);

        let blocks = RowBlocks::build(&row_ptr, m).unwrap();
        prop_assert_eq!(blocks.entries(), &entries[..]);
    }

    #[test]
    fn prop_entries_are_monotone_and_bounded(lengths in row_lengths()) {
        let row_ptr = row_ptr_from_lengths(&lengths);
        let m = lengths.len();
        let blocks = RowBlocks::build(&row_ptr, m).unwrap();
        let rows: Vec<usize> = blocks.entries().iter().map(|&e| entry_row(e)).collect();

        prop_assert_eq!(rows.first().copied(), Some(0));
        prop_assert_eq!(rows.last().copied(), Some(m));
        prop_assert!(rows.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn prop_long_rows_split_into_pieces(lengths in row_lengths()) {
        let row_ptr = row_ptr_from_lengths(&lengths);
        let blocks = RowBlocks::build(&row_ptr, lengths.len()).unwrap();

        for b in 0..blocks.num_blocks() {
            if let RowBlockKind::VectorLong { row, piece, first_block } = blocks.kind(b) {
                prop_assert!(piece < long_row_pieces(lengths[row]));
                prop_assert_eq!(first_block + piece, b);
            }
        }
    }

    #[test]
    fn prop_one_based_partition_is_identical(lengths in row_lengths()) {
        let zero = row_ptr_from_lengths(&lengths);
        let one: Vec<i32> = zero.iter().map(|p| p + 1).collect();
        prop_assert_eq!(
            RowBlocks::build(&zero, lengths.len()).unwrap(),
            RowBlocks::build(&one, lengths.len()).unwrap()
        );
    }
}
