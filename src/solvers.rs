//! This module provides the high-level solver API used by the operator functions.
//!
//! [`ShiftedLinearFamilySolver`] is the seam between the rational approximation of
//! `log(A)` and the Krylov machinery: given `A`, `b` and a family of shifts and weights
//! it returns `Σ_k w_k (A + σ_k I)^{-1} b`. [`CgmSolver`] implements it with a single
//! CG-M run per call (see [`crate::algorithms::cg_m`]).

use crate::{
    algorithms::{
        SolveStats,
        cg_m::{ShiftedSolveOutput, cg_m, conjugate_gradient},
    },
    config::CgmConfig,
    error::LogDetError,
    matrix::LinearOperator,
};
use faer::{Mat, MatRef, c64};
use std::sync::{Arc, atomic::AtomicBool};

/// Solves families of shifted linear systems that share one operator and right-hand side.
///
/// Implementations must be safe to call concurrently from several threads; all
/// iteration state belongs to the individual call.
pub trait ShiftedLinearFamilySolver: Send + Sync {
    /// Solves the unshifted system `A x = b`.
    fn solve(&self, operator: &dyn LinearOperator, b: MatRef<'_, f64>)
    -> Result<Mat<f64>, LogDetError>;

    /// Returns `Σ_k weights[k] · x_k` with `(A + shifts[k] I) x_k = b`, or
    /// `(A - shifts[k] I) x_k = b` when `negate` is set.
    fn solve_shifted_weighted(
        &self,
        operator: &dyn LinearOperator,
        b: MatRef<'_, f64>,
        shifts: &[c64],
        weights: &[c64],
        negate: bool,
    ) -> Result<Mat<c64>, LogDetError>;
}

/// Conjugate gradients with multiple shifts (CG-M).
///
/// # Example
///
/// ```
/// use faer::{c64, mat, Mat};
/// use logdet_project::solvers::{CgmSolver, ShiftedLinearFamilySolver};
///
/// let a: Mat<f64> = mat![[2.0, 0.0], [0.0, 4.0]];
/// let b: Mat<f64> = mat![[1.0], [1.0]];
/// let solver = CgmSolver::default();
///
/// // (A + 2I)^{-1} b + (A + 0I)^{-1} b
/// let shifts = [c64::new(2.0, 0.0), c64::new(0.0, 0.0)];
/// let weights = [c64::new(1.0, 0.0), c64::new(1.0, 0.0)];
/// let x = solver
///     .solve_shifted_weighted(&a, b.as_ref(), &shifts, &weights, false)
///     .unwrap();
/// assert!((x[(0, 0)].re - 0.75).abs() < 1e-10);
/// assert!((x[(1, 0)].re - (1.0 / 6.0 + 0.25)).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CgmSolver {
    config: CgmConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl CgmSolver {
    pub fn new(config: CgmConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Attaches a cancellation flag. Once it is set, running solves stop at their next
    /// iteration and return the current iterate.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &CgmConfig {
        &self.config
    }

    /// Like [`ShiftedLinearFamilySolver::solve`], additionally returning the statistics.
    pub fn solve_with_stats(
        &self,
        operator: &dyn LinearOperator,
        b: MatRef<'_, f64>,
    ) -> Result<(Mat<f64>, SolveStats), LogDetError> {
        conjugate_gradient(operator, b, &self.config, self.cancel.as_deref())
    }

    /// Like [`ShiftedLinearFamilySolver::solve_shifted_weighted`], additionally returning
    /// the statistics of the shared Krylov run.
    pub fn solve_shifted_weighted_with_stats(
        &self,
        operator: &dyn LinearOperator,
        b: MatRef<'_, f64>,
        shifts: &[c64],
        weights: &[c64],
        negate: bool,
    ) -> Result<ShiftedSolveOutput, LogDetError> {
        cg_m(
            operator,
            b,
            shifts,
            weights,
            negate,
            &self.config,
            self.cancel.as_deref(),
        )
    }
}

impl ShiftedLinearFamilySolver for CgmSolver {
    fn solve(
        &self,
        operator: &dyn LinearOperator,
        b: MatRef<'_, f64>,
    ) -> Result<Mat<f64>, LogDetError> {
        self.solve_with_stats(operator, b).map(|(x, _)| x)
    }

    fn solve_shifted_weighted(
        &self,
        operator: &dyn LinearOperator,
        b: MatRef<'_, f64>,
        shifts: &[c64],
        weights: &[c64],
        negate: bool,
    ) -> Result<Mat<c64>, LogDetError> {
        self.solve_shifted_weighted_with_stats(operator, b, shifts, weights, negate)
            .map(|output| output.solution)
    }
}
