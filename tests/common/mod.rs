//! Shared helpers for the integration tests: handles, matrix generators and
//! host reference implementations.

#![allow(dead_code)]

use std::collections::BTreeMap;

use csrkit::{CsrMatrix, DiagType, FillMode, Handle, HandleConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Handle on a device with `units` compute units and 64-lane wavefronts
pub fn handle(units: usize) -> Handle {
    Handle::with_config(HandleConfig::with_device(units, 64)).expect("handle creation failed")
}

/// Tridiagonal matrix with 2 on the diagonal and -1 beside it
pub fn create_tridiagonal_matrix(n: usize) -> CsrMatrix<f64> {
    let mut triplets = Vec::with_capacity(3 * n);
    for i in 0..n {
        if i > 0 {
            triplets.push((i, i - 1, -1.0));
        }
        triplets.push((i, i, 2.0));
        if i + 1 < n {
            triplets.push((i, i + 1, -1.0));
        }
    }
    CsrMatrix::from_triplets(n, n, &triplets)
}

/// Random matrix whose row lengths are drawn from `0..=max_row_nnz`
pub fn generate_random_matrix(m: usize, n: usize, max_row_nnz: usize, seed: u64) -> CsrMatrix<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut triplets = Vec::new();

    for i in 0..m {
        let row_nnz = rng.gen_range(0..=max_row_nnz.min(n));
        for col in sample_columns(&mut rng, n, row_nnz) {
            triplets.push((i, col, rng.gen_range(-2.0..2.0)));
        }
    }

    CsrMatrix::from_triplets(m, n, &triplets)
}

/// Mostly short rows, with the listed rows made `(row, length)` long
pub fn generate_skewed_matrix(
    m: usize,
    n: usize,
    long_rows: &[(usize, usize)],
    seed: u64,
) -> CsrMatrix<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut triplets = Vec::new();

    for i in 0..m {
        let row_nnz = long_rows
            .iter()
            .find(|&&(row, _)| row == i)
            .map(|&(_, len)| len)
            .unwrap_or_else(|| rng.gen_range(0..=8usize));
        for col in sample_columns(&mut rng, n, row_nnz.min(n)) {
            triplets.push((i, col, rng.gen_range(-1.0..1.0)));
        }
    }

    CsrMatrix::from_triplets(m, n, &triplets)
}

/// Diagonally dominant triangular matrix with up to `band` off-diagonals per row
///
/// The diagonal is always stored, so the matrix is non-singular for both
/// diagonal types.
pub fn generate_triangular_matrix(n: usize, fill_mode: FillMode, band: usize, seed: u64) -> CsrMatrix<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut triplets = Vec::new();

    for i in 0..n {
        let candidates: Vec<usize> = match fill_mode {
            FillMode::Lower => (i.saturating_sub(band)..i).collect(),
            FillMode::Upper => (i + 1..(i + 1 + band).min(n)).collect(),
        };
        for col in candidates {
            if rng.gen_bool(0.6) {
                triplets.push((i, col, rng.gen_range(-1.0..1.0)));
            }
        }
        triplets.push((i, i, band as f64 + rng.gen_range(1.0..2.0)));
    }

    CsrMatrix::from_triplets(n, n, &triplets)
}

fn sample_columns(rng: &mut ChaCha8Rng, n: usize, count: usize) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }
    if count * 2 >= n {
        let mut cols: Vec<usize> = (0..n).filter(|_| rng.gen_bool(count as f64 / n as f64)).collect();
        cols.truncate(count);
        return cols;
    }

    let mut cols = std::collections::BTreeSet::new();
    while cols.len() < count {
        cols.insert(rng.gen_range(0..n));
    }
    cols.into_iter().collect()
}

/// Random dense vector with entries in `-1..1`
pub fn random_vector(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// `alpha * A * x + beta * y`, reading `y` only when `beta` is non-zero
pub fn reference_csrmv(alpha: f64, a: &CsrMatrix<f64>, x: &[f64], beta: f64, y: &[f64]) -> Vec<f64> {
    (0..a.m)
        .map(|i| {
            let dot: f64 = a.row_iter(i).map(|(j, &v)| v * x[j]).sum();
            if beta == 0.0 {
                alpha * dot
            } else {
                alpha * dot + beta * y[i]
            }
        })
        .collect()
}

/// Reference `alpha * A * B + beta * D` as a zero-based matrix
///
/// The structure is the union of the product and addend structures; entries
/// that cancel to zero are kept.
pub fn reference_spgemm(
    alpha: Option<f64>,
    a: Option<&CsrMatrix<f64>>,
    b: Option<&CsrMatrix<f64>>,
    beta: Option<f64>,
    d: Option<&CsrMatrix<f64>>,
    m: usize,
    n: usize,
) -> CsrMatrix<f64> {
    let mut triplets = Vec::new();

    for i in 0..m {
        let mut accum: BTreeMap<usize, f64> = BTreeMap::new();

        if let (Some(alpha), Some(a), Some(b)) = (alpha, a, b) {
            for (k, &a_val) in a.row_iter(i) {
                for (j, &b_val) in b.row_iter(k) {
                    *accum.entry(j).or_insert(0.0) += alpha * a_val * b_val;
                }
            }
        }
        if let (Some(beta), Some(d)) = (beta, d) {
            for (j, &d_val) in d.row_iter(i) {
                *accum.entry(j).or_insert(0.0) += beta * d_val;
            }
        }

        triplets.extend(accum.into_iter().map(|(j, v)| (i, j, v)));
    }

    CsrMatrix::from_triplets(m, n, &triplets)
}

/// Reference solve of `A X = alpha * B` with B column-major, leading dimension `ldb`
pub fn reference_trsm(
    a: &CsrMatrix<f64>,
    fill_mode: FillMode,
    diag_type: DiagType,
    alpha: f64,
    b: &[f64],
    nrhs: usize,
    ldb: usize,
) -> Vec<f64> {
    let m = a.m;
    let mut x = b.to_vec();
    let rows: Vec<usize> = match fill_mode {
        FillMode::Lower => (0..m).collect(),
        FillMode::Upper => (0..m).rev().collect(),
    };

    for col in 0..nrhs {
        let x_col = col * ldb;
        for &i in &rows {
            let mut sum = alpha * b[x_col + i];
            let mut diag = 1.0;
            for (j, &v) in a.row_iter(i) {
                match fill_mode {
                    FillMode::Lower if j < i => sum -= v * x[x_col + j],
                    FillMode::Upper if j > i => sum -= v * x[x_col + j],
                    _ if j == i && diag_type == DiagType::NonUnit => diag = v,
                    _ => {}
                }
            }
            x[x_col + i] = sum / diag;
        }
    }

    x
}

/// Asserts element-wise closeness relative to the magnitude of `expected`
pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        let scale = e.abs().max(1.0);
        assert!(
            (a - e).abs() <= tol * scale,
            "mismatch at {}: got {}, expected {}",
            i,
            a,
            e
        );
    }
}

/// Asserts that `actual` has the structure of `expected` and close values
pub fn assert_same_matrix(actual: &CsrMatrix<f64>, expected: &CsrMatrix<f64>, tol: f64) {
    assert_eq!((actual.m, actual.n), (expected.m, expected.n), "dimension mismatch");
    assert_eq!(actual.nnz(), expected.nnz(), "nnz mismatch");
    for i in 0..actual.m {
        let got: Vec<usize> = actual.row_iter(i).map(|(j, _)| j).collect();
        let want: Vec<usize> = expected.row_iter(i).map(|(j, _)| j).collect();
        assert_eq!(got, want, "column mismatch in row {}", i);

        let got: Vec<f64> = actual.row_iter(i).map(|(_, &v)| v).collect();
        let want: Vec<f64> = expected.row_iter(i).map(|(_, &v)| v).collect();
        assert_close(&got, &want, tol);
    }
}
