//! Synthetic symmetric positive-definite test problems with known spectra.

use crate::error::{LogDetError, LogDetErrorKind};
use faer::sparse::{SparseColMat, Triplet};
use std::f64::consts::PI;

fn from_triplets(
    n: usize,
    triplets: &[Triplet<usize, usize, f64>],
) -> Result<SparseColMat<usize, f64>, LogDetError> {
    SparseColMat::try_new_from_triplets(n, n, triplets).map_err(|e| {
        LogDetErrorKind::InputError(format!("Failed to assemble sparse matrix: {e:?}")).into()
    })
}

/// Builds `diag(values)`.
pub fn diagonal(values: &[f64]) -> Result<SparseColMat<usize, f64>, LogDetError> {
    let triplets: Vec<_> = values
        .iter()
        .enumerate()
        .map(|(i, &val)| Triplet { row: i, col: i, val })
        .collect();
    from_triplets(values.len(), &triplets)
}

/// Builds the 5-point Laplacian on a `grid × grid` mesh with Dirichlet boundary,
/// plus `shift · I`. Its eigenvalues are
/// `shift + 4 sin²(πi / 2(g+1)) + 4 sin²(πj / 2(g+1))`, `1 ≤ i, j ≤ g`.
pub fn laplacian_2d(grid: usize, shift: f64) -> Result<SparseColMat<usize, f64>, LogDetError> {
    if grid == 0 {
        return Err(LogDetErrorKind::InputError("The grid must not be empty.".to_string()).into());
    }
    let n = grid * grid;
    let index = |i: usize, j: usize| i * grid + j;
    let mut triplets = Vec::with_capacity(5 * n);
    for i in 0..grid {
        for j in 0..grid {
            let k = index(i, j);
            triplets.push(Triplet {
                row: k,
                col: k,
                val: 4.0 + shift,
            });
            if i + 1 < grid {
                triplets.push(Triplet {
                    row: k,
                    col: index(i + 1, j),
                    val: -1.0,
                });
                triplets.push(Triplet {
                    row: index(i + 1, j),
                    col: k,
                    val: -1.0,
                });
            }
            if j + 1 < grid {
                triplets.push(Triplet {
                    row: k,
                    col: index(i, j + 1),
                    val: -1.0,
                });
                triplets.push(Triplet {
                    row: index(i, j + 1),
                    col: k,
                    val: -1.0,
                });
            }
        }
    }
    from_triplets(n, &triplets)
}

/// Closed-form `log det` of [`laplacian_2d`].
pub fn laplacian_2d_log_determinant(grid: usize, shift: f64) -> f64 {
    let h = PI / (2.0 * (grid as f64 + 1.0));
    let modes: Vec<f64> = (1..=grid)
        .map(|i| 4.0 * (h * i as f64).sin().powi(2))
        .collect();
    modes
        .iter()
        .flat_map(|a| modes.iter().map(move |b| (shift + a + b).ln()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{DenseExactLog, OperatorFunction};

    #[test]
    fn test_laplacian_closed_form_matches_dense() {
        let a = laplacian_2d(4, 0.5).unwrap();
        assert_eq!(a.nrows(), 16);
        let exact = DenseExactLog::new(a.as_ref().to_dense()).unwrap();
        exact.precompute().unwrap();
        let closed_form = laplacian_2d_log_determinant(4, 0.5);
        assert!((exact.log_determinant().unwrap() - closed_form).abs() < 1e-10);
    }

    #[test]
    fn test_diagonal_generator() {
        let a = diagonal(&[1.0, 2.0, 4.0]).unwrap();
        assert_eq!(a.triplet_iter().count(), 3);
        assert!(laplacian_2d(0, 1.0).is_err());
    }
}
