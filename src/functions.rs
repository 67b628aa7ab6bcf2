//! Quadratic forms `sᵀ f(A) s` of a matrix function, the quantity the trace estimator
//! averages.
//!
//! [`LogRationalApproximation`] evaluates `sᵀ log(A) s` without ever forming `log(A)`:
//! the logarithm is replaced by the rational function of [`crate::quadrature`], whose
//! partial fractions become one family of shifted solves handled by a
//! [`ShiftedLinearFamilySolver`]. [`DenseExactLog`] computes the same quantity through a
//! full eigendecomposition and serves as the reference on small problems.

use crate::{
    algorithms::cg_m::validate_rhs,
    eigen::EigenSolver,
    error::{LogDetError, LogDetErrorKind},
    matrix::LinearOperator,
    quadrature::{ShiftQuadrature, log_rational_quadrature},
    solvers::ShiftedLinearFamilySolver,
};
use faer::{Mat, MatRef, Side, unzip, zip};
use std::sync::{Arc, OnceLock};

/// A scalar functional `s ↦ sᵀ f(A) s` of a fixed symmetric operator.
pub trait OperatorFunction: Send + Sync {
    /// Dimension of the underlying operator.
    fn dimension(&self) -> usize;

    /// Performs the one-off setup (spectral bounds, quadrature, factorizations).
    /// Calling it again after it succeeded is a no-op.
    fn precompute(&self) -> Result<(), LogDetError>;

    /// Evaluates `sᵀ f(A) s`. Fails if [`OperatorFunction::precompute`] has not succeeded.
    fn compute(&self, s: MatRef<'_, f64>) -> Result<f64, LogDetError>;
}

fn not_precomputed() -> LogDetError {
    LogDetErrorKind::InputError("precompute() must succeed before compute().".to_string()).into()
}

/// `sᵀ log(A) s` through a rational approximation of `log` on the spectrum of `A`.
///
/// # Example
///
/// ```
/// use faer::{Mat, mat};
/// use logdet_project::eigen::{KnownSpectrum, SpectralBounds};
/// use logdet_project::functions::{LogRationalApproximation, OperatorFunction};
/// use logdet_project::solvers::CgmSolver;
/// use std::sync::Arc;
///
/// let a: Mat<f64> = mat![[1.0, 0.0], [0.0, 4.0]];
/// let bounds = SpectralBounds::new(1.0, 4.0).unwrap();
/// let function = LogRationalApproximation::new(
///     Arc::new(a),
///     Arc::new(KnownSpectrum(bounds)),
///     Arc::new(CgmSolver::default()),
///     1e-8,
/// );
/// function.precompute().unwrap();
///
/// let s: Mat<f64> = mat![[1.0], [1.0]];
/// let value = function.compute(s.as_ref()).unwrap();
/// assert!((value - 4.0f64.ln()).abs() < 1e-6);
/// ```
pub struct LogRationalApproximation {
    operator: Arc<dyn LinearOperator>,
    eigen_solver: Arc<dyn EigenSolver>,
    solver: Arc<dyn ShiftedLinearFamilySolver>,
    accuracy: f64,
    quadrature: OnceLock<ShiftQuadrature>,
}

impl LogRationalApproximation {
    pub fn new(
        operator: Arc<dyn LinearOperator>,
        eigen_solver: Arc<dyn EigenSolver>,
        solver: Arc<dyn ShiftedLinearFamilySolver>,
        accuracy: f64,
    ) -> Self {
        Self {
            operator,
            eigen_solver,
            solver,
            accuracy,
            quadrature: OnceLock::new(),
        }
    }

    /// The cached quadrature, once [`OperatorFunction::precompute`] has succeeded.
    pub fn quadrature(&self) -> Option<&ShiftQuadrature> {
        self.quadrature.get()
    }

    pub fn num_shifts(&self) -> Option<usize> {
        self.quadrature.get().map(ShiftQuadrature::num_shifts)
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn operator(&self) -> &Arc<dyn LinearOperator> {
        &self.operator
    }

    fn build_quadrature(&self) -> Result<ShiftQuadrature, LogDetError> {
        let bounds = self.eigen_solver.compute()?;
        if bounds.min <= 0.0 {
            return Err(LogDetErrorKind::NotPositiveDefinite {
                min_eigenvalue: bounds.min,
            }
            .into());
        }
        let quadrature = log_rational_quadrature(bounds, self.accuracy)?;
        log::info!(
            "Rational approximation of log on [{:.4e}, {:.4e}] with {} shifts.",
            bounds.min,
            bounds.max,
            quadrature.num_shifts()
        );
        Ok(quadrature)
    }
}

impl OperatorFunction for LogRationalApproximation {
    fn dimension(&self) -> usize {
        self.operator.dimension()
    }

    fn precompute(&self) -> Result<(), LogDetError> {
        if self.quadrature.get().is_some() {
            return Ok(());
        }
        let quadrature = self.build_quadrature()?;
        // A concurrent caller may have won the race; both results are identical.
        let _ = self.quadrature.set(quadrature);
        Ok(())
    }

    fn compute(&self, s: MatRef<'_, f64>) -> Result<f64, LogDetError> {
        let quadrature = self.quadrature.get().ok_or_else(not_precomputed)?;
        validate_rhs(self.operator.as_ref(), s)?;

        let combination = self.solver.solve_shifted_weighted(
            self.operator.as_ref(),
            s,
            &quadrature.shifts,
            &quadrature.weights,
            false,
        )?;

        let mut value = 0.0;
        let mut norm_sq = 0.0;
        zip!(s.col(0), combination.col(0)).for_each(|unzip!(s, z)| {
            value += *s * z.re;
            norm_sq += *s * *s;
        });
        let value = value + quadrature.constant_term * norm_sq;

        if !value.is_finite() {
            log::warn!("Quadratic form sᵀ log(A) s evaluated to {value}.");
        }
        Ok(value)
    }
}

/// Dense eigendecomposition of `A`, kept after precompute.
struct SpectralDecomposition {
    eigenvalues: Vec<f64>,
    eigenvectors: Mat<f64>,
}

/// Exact `sᵀ log(A) s` from the dense eigendecomposition `A = Q Λ Qᵀ`.
///
/// Cubic in the dimension; meant as a reference for small operators.
pub struct DenseExactLog {
    matrix: Mat<f64>,
    decomposition: OnceLock<SpectralDecomposition>,
}

impl DenseExactLog {
    pub fn new(matrix: Mat<f64>) -> Result<Self, LogDetError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(LogDetErrorKind::DimensionMismatch {
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            }
            .into());
        }
        Ok(Self {
            matrix,
            decomposition: OnceLock::new(),
        })
    }

    /// `log det(A) = Σ log λ_i`, running the decomposition if needed.
    pub fn log_determinant(&self) -> Result<f64, LogDetError> {
        self.precompute()?;
        let decomposition = self.decomposition.get().ok_or_else(not_precomputed)?;
        Ok(decomposition.eigenvalues.iter().map(|lambda| lambda.ln()).sum())
    }

    fn decompose(&self) -> Result<SpectralDecomposition, LogDetError> {
        let evd = self
            .matrix
            .as_ref()
            .self_adjoint_eigen(Side::Lower)
            .map_err(|e| LogDetError::from(LogDetErrorKind::EvdError(e)))?;
        let s = evd.S();
        let eigenvalues: Vec<f64> = (0..self.matrix.nrows()).map(|i| s[i]).collect();

        let min_eigenvalue = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
        if min_eigenvalue <= 0.0 {
            return Err(LogDetErrorKind::NotPositiveDefinite { min_eigenvalue }.into());
        }
        Ok(SpectralDecomposition {
            eigenvalues,
            eigenvectors: evd.U().to_owned(),
        })
    }
}

impl OperatorFunction for DenseExactLog {
    fn dimension(&self) -> usize {
        self.matrix.nrows()
    }

    fn precompute(&self) -> Result<(), LogDetError> {
        if self.decomposition.get().is_none() {
            let decomposition = self.decompose()?;
            let _ = self.decomposition.set(decomposition);
        }
        Ok(())
    }

    fn compute(&self, s: MatRef<'_, f64>) -> Result<f64, LogDetError> {
        let decomposition = self.decomposition.get().ok_or_else(not_precomputed)?;
        validate_rhs(&self.matrix, s)?;

        // sᵀ Q log(Λ) Qᵀ s
        let projected = decomposition.eigenvectors.transpose() * s;
        Ok(decomposition
            .eigenvalues
            .iter()
            .enumerate()
            .map(|(i, lambda)| lambda.ln() * projected[(i, 0)] * projected[(i, 0)])
            .sum())
    }
}
