//! Dependency levels of a triangular matrix
//!
//! Row `i` of a lower triangular matrix depends on every row `j < i` with a
//! stored entry `A[i, j]`. Its level is one more than the deepest of those
//! rows; rows without dependencies sit on level 0. Upper triangular matrices
//! are handled the same way from the last row upwards.
//!
//! Launching rows in level order guarantees that every row a block waits on
//! was claimed by an earlier block.

use crate::error::{Result, SparseError};
use crate::matrix::{CsrPattern, DiagType, FillMode};

/// Rows ordered by dependency level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSchedule {
    /// Rows sorted by `(level, row)`
    pub map: Vec<i32>,
    /// Number of rows on each level
    pub level_sizes: Vec<usize>,
}

impl LevelSchedule {
    pub fn num_levels(&self) -> usize {
        self.level_sizes.len()
    }
}

/// Computes the level schedule of the `fill_mode` triangle of `a`
///
/// Entries outside the triangle are ignored.
pub fn compute_levels(a: &CsrPattern<'_>, fill_mode: FillMode) -> Result<LevelSchedule> {
    let m = a.m;
    let mut level = Vec::new();
    level
        .try_reserve_exact(m)
        .map_err(|_| SparseError::memory::<usize>(m))?;
    level.resize(m, 0usize);

    let mut visit = |i: usize| {
        let depth = a
            .row_range(i)
            .map(|j| a.col(j))
            .filter(|&col| match fill_mode {
                FillMode::Lower => col < i,
                FillMode::Upper => col > i && col < m,
            })
            .map(|col| level[col] + 1)
            .max()
            .unwrap_or(0);
        level[i] = depth;
    };
    match fill_mode {
        FillMode::Lower => (0..m).for_each(&mut visit),
        FillMode::Upper => (0..m).rev().for_each(&mut visit),
    }

    let num_levels = level.iter().max().map_or(0, |&l| l + 1);
    let mut level_sizes = vec![0usize; num_levels];
    for &l in &level {
        level_sizes[l] += 1;
    }

    // Counting sort keeps rows ascending within a level.
    let mut cursor: Vec<usize> = level_sizes
        .iter()
        .scan(0, |acc, &size| {
            let start = *acc;
            *acc += size;
            Some(start)
        })
        .collect();
    let mut map = vec![0i32; m];
    for (row, &l) in level.iter().enumerate() {
        map[cursor[l]] = row as i32;
        cursor[l] += 1;
    }

    Ok(LevelSchedule { map, level_sizes })
}

/// First row without a stored diagonal entry, offset by the index base
///
/// Rows with a unit diagonal never have a structural pivot.
pub fn structural_pivot(a: &CsrPattern<'_>, diag_type: DiagType) -> Option<i32> {
    if diag_type == DiagType::Unit {
        return None;
    }
    (0..a.m)
        .find(|&i| !a.row_range(i).any(|j| a.col(j) == i))
        .map(|i| i as i32 + a.base())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{CsrMatrix, IndexBase};

    fn lower() -> CsrMatrix<f64> {
        // [[1, 0, 0, 0],
        //  [1, 1, 0, 0],
        //  [0, 0, 1, 0],
        //  [0, 1, 1, 1]]
        CsrMatrix::from_triplets(
            4,
            4,
            &[
                (0, 0, 1.0),
                (1, 0, 1.0),
                (1, 1, 1.0),
                (2, 2, 1.0),
                (3, 1, 1.0),
                (3, 2, 1.0),
                (3, 3, 1.0),
            ],
        )
    }

    #[test]
    fn test_lower_levels() {
        let a = lower();
        let schedule = compute_levels(&a.pattern(), FillMode::Lower).unwrap();
        assert_eq!(schedule.map, vec![0, 2, 1, 3]);
        assert_eq!(schedule.level_sizes, vec![2, 1, 1]);
        assert_eq!(schedule.num_levels(), 3);
    }

    #[test]
    fn test_upper_levels_ignore_lower_entries() {
        let a = lower();
        let schedule = compute_levels(&a.pattern(), FillMode::Upper).unwrap();
        assert_eq!(schedule.map, vec![0, 1, 2, 3]);
        assert_eq!(schedule.level_sizes, vec![4]);
    }

    #[test]
    fn test_upper_chain() {
        let a = CsrMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 1.0), (0, 2, 1.0), (1, 1, 1.0), (1, 2, 1.0), (2, 2, 1.0)],
        )
        .with_base(IndexBase::One);
        let schedule = compute_levels(&a.pattern(), FillMode::Upper).unwrap();
        assert_eq!(schedule.map, vec![2, 0, 1]);
        assert_eq!(schedule.level_sizes, vec![1, 2]);
    }

    #[test]
    fn test_structural_pivot() {
        let a = CsrMatrix::from_triplets(3, 3, &[(0, 0, 1.0), (1, 0, 1.0), (2, 2, 1.0)])
            .with_base(IndexBase::One);
        assert_eq!(structural_pivot(&a.pattern(), DiagType::NonUnit), Some(2));
        assert_eq!(structural_pivot(&a.pattern(), DiagType::Unit), None);
        assert_eq!(structural_pivot(&lower().pattern(), DiagType::NonUnit), None);
    }

    #[test]
    fn test_empty_matrix() {
        let a = CsrMatrix::<f64>::zeros(0, 0);
        let schedule = compute_levels(&a.pattern(), FillMode::Lower).unwrap();
        assert!(schedule.map.is_empty());
        assert_eq!(schedule.num_levels(), 0);
    }
}
