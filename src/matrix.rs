//! This module defines the core abstraction for linear operators.
//!
//! The estimator never looks at individual matrix entries. Every algorithm in this crate
//! (CG-M, Lanczos, the rational approximation of `log(A)`) only needs the action
//! `v ↦ A v`, so they are written against the [`LinearOperator`] trait and work the same
//! way for dense matrices, sparse matrices, or user types that compute the product
//! without storing a matrix.
//!
//! Operators are shared read-only between the worker threads of the estimator, which is
//! why the trait requires `Send + Sync`.
//!
//! Products run with `Par::Seq`: the estimator already parallelizes over independent
//! estimates, and each operator application stays on the calling thread.
//!
//! The probing sampler additionally needs the graph of nonzeros of `A`; that capability
//! is the separate [`SparsityPattern`] trait.

use faer::{
    Accum, Mat, MatRef, Par,
    linalg::matmul::matmul,
    sparse::{SparseColMat, linalg::matmul::sparse_dense_matmul},
};

/// Represents a real symmetric linear operator `A` that can be applied to a column vector.
///
/// Vectors are `n × 1` [`faer::Mat`] columns throughout the crate.
///
/// # Example
///
/// ```
/// use faer::{Mat, mat};
/// use logdet_project::matrix::LinearOperator;
///
/// let a: Mat<f64> = mat![[2.0, -1.0], [-1.0, 2.0]];
/// let x: Mat<f64> = mat![[1.0], [1.0]];
/// let operator: &dyn LinearOperator = &a;
/// assert_eq!(operator.dimension(), 2);
/// assert_eq!(operator.apply(x.as_ref()), mat![[1.0], [1.0]]);
/// ```
pub trait LinearOperator: Send + Sync {
    /// Returns the dimension `n` of the (square) operator.
    fn dimension(&self) -> usize;

    /// Applies the operator to the column vector `rhs` and returns `A * rhs`.
    ///
    /// # Panics
    ///
    /// Implementations are expected to panic if `rhs.nrows() != self.dimension()`.
    /// The solvers validate dimensions before they start iterating.
    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64>;
}

/// Implementation of `LinearOperator` for `faer`'s immutable dense matrix view (`MatRef`).
impl<'a> LinearOperator for MatRef<'a, f64> {
    #[inline]
    fn dimension(&self) -> usize {
        self.nrows()
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        assert_eq!(
            self.ncols(),
            rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.ncols(),
            rhs.nrows(),
        );
        let mut out = Mat::<f64>::zeros(self.nrows(), rhs.ncols());
        matmul(out.as_mut(), Accum::Replace, *self, rhs, 1.0, Par::Seq);
        out
    }
}

/// Implementation of `LinearOperator` for `faer`'s owned dense matrix (`Mat`).
impl LinearOperator for Mat<f64> {
    #[inline]
    fn dimension(&self) -> usize {
        self.nrows()
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        self.as_ref().apply(rhs)
    }
}

/// Implementation of `LinearOperator` for a sparse matrix in compressed sparse column format.
impl LinearOperator for SparseColMat<usize, f64> {
    #[inline]
    fn dimension(&self) -> usize {
        self.nrows()
    }

    fn apply(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        assert_eq!(
            self.ncols(),
            rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.ncols(),
            rhs.nrows(),
        );

        let mut out = Mat::<f64>::zeros(self.nrows(), rhs.ncols());
        sparse_dense_matmul(out.as_mut(), Accum::Replace, self.as_ref(), rhs, 1.0, Par::Seq);
        out
    }
}

/// Exposes the undirected graph of off-diagonal nonzeros of a symmetric matrix.
///
/// Vertex `i` is adjacent to `j` whenever `A[i, j] != 0` or `A[j, i] != 0`, `i != j`.
/// The number of vertices is the operator dimension.
pub trait SparsityPattern: LinearOperator {
    /// Returns the sorted, deduplicated neighbour list of every vertex.
    fn adjacency(&self) -> Vec<Vec<usize>>;
}

impl SparsityPattern for SparseColMat<usize, f64> {
    fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.nrows().max(self.ncols())];
        for triplet in self.triplet_iter() {
            if triplet.row != triplet.col && *triplet.val != 0.0 {
                adjacency[triplet.row].push(triplet.col);
                adjacency[triplet.col].push(triplet.row);
            }
        }
        finalize_adjacency(adjacency)
    }
}

impl SparsityPattern for Mat<f64> {
    fn adjacency(&self) -> Vec<Vec<usize>> {
        let n = self.nrows();
        let mut adjacency = vec![Vec::new(); n];
        for j in 0..self.ncols() {
            for i in 0..n {
                if i != j && self[(i, j)] != 0.0 {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        finalize_adjacency(adjacency)
    }
}

fn finalize_adjacency(mut adjacency: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    for neighbours in adjacency.iter_mut() {
        neighbours.sort_unstable();
        neighbours.dedup();
    }
    adjacency
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::{mat, sparse::Triplet};

    fn tridiagonal_sparse(n: usize) -> SparseColMat<usize, f64> {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push(Triplet {
                row: i,
                col: i,
                val: 2.0,
            });
            if i + 1 < n {
                triplets.push(Triplet {
                    row: i,
                    col: i + 1,
                    val: -1.0,
                });
                triplets.push(Triplet {
                    row: i + 1,
                    col: i,
                    val: -1.0,
                });
            }
        }
        SparseColMat::try_new_from_triplets(n, n, &triplets).unwrap()
    }

    #[test]
    fn test_linear_operator_for_mat() {
        let matrix: Mat<f64> = mat![[2.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 2.0],];
        let vector: Mat<f64> = mat![[1.0], [2.0], [3.0]];
        let expected_result = &matrix * &vector;

        let operator: &dyn LinearOperator = &matrix;
        assert_eq!(operator.apply(vector.as_ref()), expected_result);
        assert_eq!(operator.dimension(), 3);

        let operator_ref: &dyn LinearOperator = &matrix.as_ref();
        assert_eq!(operator_ref.apply(vector.as_ref()), expected_result);
    }

    #[test]
    fn test_sparse_operator_matches_dense() {
        let sparse = tridiagonal_sparse(4);
        let dense: Mat<f64> = mat![
            [2.0, -1.0, 0.0, 0.0],
            [-1.0, 2.0, -1.0, 0.0],
            [0.0, -1.0, 2.0, -1.0],
            [0.0, 0.0, -1.0, 2.0],
        ];
        let vector: Mat<f64> = mat![[1.0], [-2.0], [0.5], [4.0]];

        let from_sparse = LinearOperator::apply(&sparse, vector.as_ref());
        let from_dense = LinearOperator::apply(&dense, vector.as_ref());
        assert!((&from_sparse - &from_dense).norm_l2() < 1e-14);
        assert_eq!(LinearOperator::dimension(&sparse), 4);
    }

    #[test]
    fn test_sparse_product_sums_duplicates_and_handles_blocks() {
        let triplets = [
            Triplet { row: 0, col: 0, val: 1.0 },
            Triplet { row: 0, col: 0, val: 2.0 },
            Triplet { row: 1, col: 0, val: -1.0 },
            Triplet { row: 1, col: 1, val: 4.0 },
        ];
        let sparse = SparseColMat::try_new_from_triplets(2, 2, &triplets).unwrap();
        let block: Mat<f64> = mat![[1.0, 0.0], [2.0, 1.0]];
        let result = LinearOperator::apply(&sparse, block.as_ref());
        assert_eq!(result, mat![[3.0, 0.0], [7.0, 4.0]]);
        assert_eq!(result, &sparse.as_ref().to_dense() * &block);
    }

    #[test]
    fn test_sparsity_pattern_of_tridiagonal() {
        let sparse = tridiagonal_sparse(4);
        let adjacency = sparse.adjacency();
        assert_eq!(adjacency, vec![vec![1], vec![0, 2], vec![1, 3], vec![2]]);

        let dense: Mat<f64> = mat![[1.0, 0.0], [0.0, 3.0]];
        assert_eq!(dense.adjacency(), vec![Vec::<usize>::new(), Vec::new()]);
    }

    #[test]
    #[should_panic(
        expected = "Dimension mismatch: operator columns (2) do not match vector rows (3)."
    )]
    fn test_dimension_mismatch_panic() {
        let matrix: Mat<f64> = mat![[1.0, 0.0], [0.0, 1.0]];
        let vector: Mat<f64> = mat![[1.0], [2.0], [3.0]];
        let operator: &dyn LinearOperator = &matrix;
        operator.apply(vector.as_ref());
    }
}
