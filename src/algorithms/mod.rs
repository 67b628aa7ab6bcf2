//! Low-level iterative kernels used by the public solvers.
//!
//! ** NOTE: We recommend using the high-level types in [`crate::solvers`], [`crate::eigen`]
//! and [`crate::estimator`] instead. The modules below expose the raw iterations for
//! benchmarking and for callers that need fine-grained control.
//!
//! - [`cg_m`]: the multi-shift conjugate gradient recurrence (CG-M).
//! - [`lanczos`]: symmetric Lanczos with full reorthogonalization, used to bound the
//!   spectrum of the operator.
//! - [`elliptic`]: complete elliptic integrals and Jacobi elliptic functions for the
//!   contour quadrature.
//! - [`coloring`]: greedy distance-`p` graph colouring for probing vectors.
//!
//! This module also holds the small vector kernels and the convergence bookkeeping
//! shared by the iterations.

pub mod cg_m;
pub mod coloring;
pub mod elliptic;
pub mod lanczos;

use faer::{Mat, MatRef, c64, unzip, zip};

/// Why an iterative solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The residual norm met the requested tolerance.
    Converged,
    /// `pᵀAp` vanished; the iteration cannot proceed.
    Breakdown,
    /// The iteration budget was exhausted before the tolerance was met.
    MaxIterations,
    /// The caller raised the cancellation flag.
    Cancelled,
}

/// Convergence statistics reported by the CG-family solvers.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveStats {
    /// Number of completed iterations (matrix-vector products).
    pub iterations: usize,
    /// Unshifted residual norms after each iteration, if recording was enabled.
    /// The first entry is the norm of the right-hand side.
    pub residual_norms: Vec<f64>,
    /// Norm of the final unshifted residual.
    pub final_residual_norm: f64,
    pub termination: Termination,
}

/// Returns the threshold below which a Krylov coefficient is treated as zero.
#[inline]
pub(crate) fn breakdown_tolerance() -> f64 {
    f64::EPSILON * 1e3
}

/// Real dot product of two column vectors.
#[inline]
pub(crate) fn dot(a: MatRef<'_, f64>, b: MatRef<'_, f64>) -> f64 {
    debug_assert_eq!(a.nrows(), b.nrows());
    let mut sum = 0.0;
    zip!(a.col(0), b.col(0)).for_each(|unzip!(a, b)| sum += *a * *b);
    sum
}

/// `y += alpha * x` for real column vectors.
#[inline]
pub(crate) fn axpy(y: &mut Mat<f64>, alpha: f64, x: MatRef<'_, f64>) {
    zip!(y.as_mut(), x).for_each(|unzip!(y, x)| *y += alpha * *x);
}

/// `p = r + alpha * p`, the CG direction update.
#[inline]
pub(crate) fn update_direction(p: &mut Mat<f64>, alpha: f64, r: MatRef<'_, f64>) {
    zip!(p.as_mut(), r).for_each(|unzip!(p, r)| *p = *r + alpha * *p);
}

/// Casts a real column vector into a complex one.
#[inline]
pub(crate) fn to_complex(x: MatRef<'_, f64>) -> Mat<c64> {
    Mat::from_fn(x.nrows(), 1, |i, _| c64::new(x[(i, 0)], 0.0))
}

/// Elementwise real part of a complex column vector.
#[inline]
pub fn real_part(x: MatRef<'_, c64>) -> Mat<f64> {
    Mat::from_fn(x.nrows(), 1, |i, _| x[(i, 0)].re)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn test_vector_kernels() {
        let a: Mat<f64> = mat![[1.0], [2.0], [3.0]];
        let mut b: Mat<f64> = mat![[4.0], [-5.0], [6.0]];
        assert_eq!(dot(a.as_ref(), b.as_ref()), 12.0);

        axpy(&mut b, 2.0, a.as_ref());
        assert_eq!(b, mat![[6.0], [-1.0], [12.0]]);

        update_direction(&mut b, 0.5, a.as_ref());
        assert_eq!(b, mat![[4.0], [1.5], [9.0]]);

        let z = to_complex(a.as_ref());
        assert_eq!(z[(1, 0)], c64::new(2.0, 0.0));
        assert_eq!(real_part(z.as_ref()), a);
    }
}
