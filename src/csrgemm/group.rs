//! # Row grouping for SpGEMM
//!
//! Rows of C are bucketed into [`CSRGEMM_GROUPS`] groups by a per-row work
//! metric so that each group runs a kernel sized for its rows:
//!
//! - the symbolic pass groups by the number of intermediate products,
//! - the numeric pass groups by the number of non-zeros of the C row.
//!
//! Group sizes are counted per block first and folded by a single block
//! afterwards. Rows are then laid out group by group in a stable permutation.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::constants::{CSRGEMM_DIM, CSRGEMM_GROUPS, CSRGEMM_SUB};
use crate::device::reduce::{block_reduce_groups, block_reduce_max, wf_reduce_sum};
use crate::device::{grid_size, Stream};
use crate::error::{Result, SparseError};
use crate::matrix::CsrPattern;
use crate::utils::exclusive_scan;

/// Group of a row given its metric and the inclusive bounds of groups `0..=6`
pub fn classify(metric: usize, bounds: &[usize; CSRGEMM_GROUPS - 1]) -> usize {
    bounds
        .iter()
        .position(|&bound| metric <= bound)
        .unwrap_or(CSRGEMM_GROUPS - 1)
}

/// Rows of a matrix bucketed into groups
#[derive(Debug, Clone)]
pub struct RowGroups {
    /// Number of rows in each group
    pub sizes: [usize; CSRGEMM_GROUPS],
    /// Start of each group in `perm` (`CSRGEMM_GROUPS + 1` entries)
    pub offsets: Vec<usize>,
    /// Rows ordered by group, stable within a group
    pub perm: Vec<i32>,
}

impl RowGroups {
    /// Rows of group `g`
    pub fn rows(&self, g: usize) -> &[i32] {
        &self.perm[self.offsets[g]..self.offsets[g + 1]]
    }

    /// Total number of rows
    pub fn total_rows(&self) -> usize {
        self.perm.len()
    }

    /// Returns the only non-empty group, if all rows share one group
    pub fn single_group(&self) -> Option<usize> {
        let mut non_empty = self.sizes.iter().enumerate().filter(|(_, &s)| s > 0);
        match (non_empty.next(), non_empty.next()) {
            (Some((g, _)), None) => Some(g),
            _ => None,
        }
    }

    /// Percentage of rows in each group
    pub fn percentages(&self) -> [f64; CSRGEMM_GROUPS] {
        let total = self.total_rows() as f64;
        let mut pct = [0.0; CSRGEMM_GROUPS];
        if total > 0.0 {
            for (p, &s) in pct.iter_mut().zip(&self.sizes) {
                *p = s as f64 / total * 100.0;
            }
        }
        pct
    }
}

/// Counts the intermediate products of every row of `alpha * A * B + beta * D`
///
/// Row `i` produces `sum(nnz(B[k, :]) for k in A[i, :])` products from the
/// multiplication and `nnz(D[i, :])` from the addition. Each row is handled
/// by [`CSRGEMM_SUB`] lanes.
pub fn intermediate_products(
    stream: &Stream,
    m: usize,
    a: Option<&CsrPattern<'_>>,
    b: Option<&CsrPattern<'_>>,
    d: Option<&CsrPattern<'_>>,
) -> Vec<usize> {
    let products: Vec<AtomicUsize> = (0..m).map(|_| AtomicUsize::new(0)).collect();
    let rows_per_block = CSRGEMM_DIM / CSRGEMM_SUB;

    stream.launch(grid_size(m, rows_per_block), |block| {
        let mut lanes = [0usize; CSRGEMM_SUB];
        for w in 0..rows_per_block {
            let row = block * rows_per_block + w;
            if row >= m {
                break;
            }

            lanes.fill(0);
            if let (Some(a), Some(b)) = (a, b) {
                let range = a.row_range(row);
                for (lid, lane) in lanes.iter_mut().enumerate() {
                    for j in (range.start + lid..range.end).step_by(CSRGEMM_SUB) {
                        *lane += b.row_len(a.col(j));
                    }
                }
            }
            let mut nprod = wf_reduce_sum(&mut lanes);
            if let Some(d) = d {
                nprod += d.row_len(row);
            }

            products[row].store(nprod, Ordering::Relaxed);
        }
    });

    products.into_iter().map(AtomicUsize::into_inner).collect()
}

/// Buckets `m` rows by `metric` and builds the group permutation
///
/// Pass one runs [`CSRGEMM_DIM`] blocks striding over the rows; every lane
/// counts its rows per group and the block folds the counts. Pass two folds
/// the per-block counts in a single block.
pub fn group_rows<F>(
    stream: &Stream,
    m: usize,
    bounds: &[usize; CSRGEMM_GROUPS - 1],
    metric: F,
) -> Result<RowGroups>
where
    F: Fn(usize) -> usize + Sync,
{
    let group_of_row: Vec<AtomicU8> = (0..m).map(|_| AtomicU8::new(0)).collect();
    let block_sizes: Vec<AtomicUsize> = (0..CSRGEMM_DIM * CSRGEMM_GROUPS)
        .map(|_| AtomicUsize::new(0))
        .collect();

    stream.launch(CSRGEMM_DIM, |block| {
        let mut sdata = vec![0usize; CSRGEMM_DIM * CSRGEMM_GROUPS];
        for tid in 0..CSRGEMM_DIM {
            let mut row = block * CSRGEMM_DIM + tid;
            while row < m {
                let g = classify(metric(row), bounds);
                sdata[tid * CSRGEMM_GROUPS + g] += 1;
                group_of_row[row].store(g as u8, Ordering::Relaxed);
                row += CSRGEMM_DIM * CSRGEMM_DIM;
            }
        }
        block_reduce_groups(&mut sdata, CSRGEMM_GROUPS);
        for g in 0..CSRGEMM_GROUPS {
            block_sizes[block * CSRGEMM_GROUPS + g].store(sdata[g], Ordering::Relaxed);
        }
    });

    let sizes_out: Vec<AtomicUsize> = (0..CSRGEMM_GROUPS).map(|_| AtomicUsize::new(0)).collect();
    stream.launch(1, |_| {
        let mut sdata: Vec<usize> = block_sizes
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .collect();
        block_reduce_groups(&mut sdata, CSRGEMM_GROUPS);
        for g in 0..CSRGEMM_GROUPS {
            sizes_out[g].store(sdata[g], Ordering::Relaxed);
        }
    });

    let mut sizes = [0usize; CSRGEMM_GROUPS];
    for (s, out) in sizes.iter_mut().zip(&sizes_out) {
        *s = out.load(Ordering::Relaxed);
    }

    // Stable counting sort of the rows by group.
    let offsets = exclusive_scan(&sizes);
    let mut cursor = offsets.clone();
    let mut perm = Vec::new();
    perm.try_reserve_exact(m)
        .map_err(|_| SparseError::memory::<i32>(m))?;
    perm.resize(m, 0i32);
    for (row, g) in group_of_row.iter().enumerate() {
        let g = g.load(Ordering::Relaxed) as usize;
        perm[cursor[g]] = row as i32;
        cursor[g] += 1;
    }

    Ok(RowGroups {
        sizes,
        offsets,
        perm,
    })
}

/// Maximum of `metric` over `rows`, computed by a two-pass block reduction
pub fn max_metric<F>(stream: &Stream, rows: &[i32], metric: F) -> usize
where
    F: Fn(usize) -> usize + Sync,
{
    let block_max: Vec<AtomicUsize> = (0..CSRGEMM_DIM).map(|_| AtomicUsize::new(0)).collect();

    stream.launch(CSRGEMM_DIM, |block| {
        let mut sdata = vec![0usize; CSRGEMM_DIM];
        for (tid, lane) in sdata.iter_mut().enumerate() {
            let mut idx = block * CSRGEMM_DIM + tid;
            while idx < rows.len() {
                *lane = (*lane).max(metric(rows[idx] as usize));
                idx += CSRGEMM_DIM * CSRGEMM_DIM;
            }
        }
        block_max[block].store(block_reduce_max(&mut sdata), Ordering::Relaxed);
    });

    let mut sdata: Vec<usize> = block_max
        .into_iter()
        .map(AtomicUsize::into_inner)
        .collect();
    block_reduce_max(&mut sdata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CSRGEMM_FILL_GROUP_BOUNDS, CSRGEMM_NNZ_GROUP_BOUNDS};
    use crate::device::HandleConfig;
    use crate::matrix::CsrMatrix;

    fn stream() -> Stream {
        Stream::new(HandleConfig::with_device(3, 64).device).unwrap()
    }

    #[test]
    fn test_classify_bounds() {
        assert_eq!(classify(0, &CSRGEMM_NNZ_GROUP_BOUNDS), 0);
        assert_eq!(classify(32, &CSRGEMM_NNZ_GROUP_BOUNDS), 0);
        assert_eq!(classify(33, &CSRGEMM_NNZ_GROUP_BOUNDS), 1);
        assert_eq!(classify(8192, &CSRGEMM_NNZ_GROUP_BOUNDS), 6);
        assert_eq!(classify(8193, &CSRGEMM_NNZ_GROUP_BOUNDS), 7);
        assert_eq!(classify(17, &CSRGEMM_FILL_GROUP_BOUNDS), 1);
    }

    #[test]
    fn test_group_rows_is_stable_permutation() {
        let metrics = [5usize, 40, 600, 5, 9000, 40, 0];
        let groups = group_rows(&stream(), metrics.len(), &CSRGEMM_NNZ_GROUP_BOUNDS, |r| {
            metrics[r]
        })
        .unwrap();

        assert_eq!(groups.sizes, [3, 2, 0, 1, 0, 0, 0, 1]);
        assert_eq!(groups.rows(0), &[0, 3, 6]);
        assert_eq!(groups.rows(1), &[1, 5]);
        assert_eq!(groups.rows(3), &[2]);
        assert_eq!(groups.rows(7), &[4]);
        assert_eq!(groups.single_group(), None);
    }

    #[test]
    fn test_single_group() {
        let groups = group_rows(&stream(), 10, &CSRGEMM_NNZ_GROUP_BOUNDS, |_| 1).unwrap();
        assert_eq!(groups.single_group(), Some(0));
        assert_eq!(groups.percentages()[0], 100.0);
    }

    #[test]
    fn test_group_rows_many_rows() {
        let m = 100_000;
        let groups = group_rows(&stream(), m, &CSRGEMM_NNZ_GROUP_BOUNDS, |r| r % 100).unwrap();
        assert_eq!(groups.sizes.iter().sum::<usize>(), m);
        assert_eq!(groups.sizes[0], 33 * 1000);
        assert_eq!(groups.sizes[1], 32 * 1000);
        assert_eq!(groups.sizes[2], 35 * 1000);
    }

    #[test]
    fn test_intermediate_products() {
        // A = [[1, 1], [0, 1]], B = [[1, 1, 1], [1, 0, 0]], D = I(3)[0..2]
        let a = CsrMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![1.0, 1.0, 1.0]);
        let b = CsrMatrix::new(2, 3, vec![0, 3, 4], vec![0, 1, 2, 0], vec![1.0; 4]);
        let d = CsrMatrix::new(2, 3, vec![0, 1, 2], vec![0, 1], vec![1.0; 2]);

        let products = intermediate_products(
            &stream(),
            2,
            Some(&a.pattern()),
            Some(&b.pattern()),
            Some(&d.pattern()),
        );
        assert_eq!(products, vec![5, 2]);

        let products = intermediate_products(&stream(), 2, None, None, Some(&d.pattern()));
        assert_eq!(products, vec![1, 1]);
    }

    #[test]
    fn test_max_metric() {
        let values = [3usize, 99, 7, 12];
        let rows: Vec<i32> = vec![0, 2, 3];
        assert_eq!(max_metric(&stream(), &rows, |r| values[r]), 12);
        assert_eq!(max_metric(&stream(), &[], |r| values[r]), 0);
    }
}
