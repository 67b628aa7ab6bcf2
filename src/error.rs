//! This module defines the custom error types for the library.
//!
//! Every failure that can escape the estimator, the shifted solvers, the samplers or the
//! quadrature is represented by the single public type [`LogDetError`]. The variants
//! themselves live in the crate-private [`LogDetErrorKind`] so new kinds can be added
//! without breaking callers, while [`thiserror`] provides the `Display` implementation.
//!
//! Numerical events that only reduce precision (CG breakdown, non-convergence,
//! cancellation) are deliberately absent: the solvers log them and return their best
//! iterate instead. Note that [`faer::linalg::evd::EvdError`] does not implement the
//! standard [`std::error::Error`] trait, so we wrap it manually.
use thiserror::Error;

/// Represents all possible errors that can occur while estimating a log-determinant.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct LogDetError(#[from] LogDetErrorKind);

/// Private enum containing the distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum LogDetErrorKind {
    /// The operator and a vector (or another collaborator) disagree on the dimension.
    #[error("Dimension mismatch: operator has dimension {expected} but vector has {actual} rows.")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Two parameters that must have matching lengths do not.
    #[error("Parameter mismatch for '{param_name}': expected length {expected}, got {actual}.")]
    ParameterMismatch {
        param_name: String,
        expected: usize,
        actual: usize,
    },

    /// Indicates that an invalid input parameter was provided to a function.
    #[error("Invalid input parameter: {0}")]
    InputError(String),

    /// The smallest eigenvalue estimate is not positive, so `log(A)` is undefined.
    #[error(
        "Operator is not positive definite: estimated minimum eigenvalue is {min_eigenvalue}."
    )]
    NotPositiveDefinite { min_eigenvalue: f64 },

    /// A quadrature shift makes `A + σI` singular for some eigenvalue in the spectrum bounds.
    #[error("Shift {index} lies on the negated spectrum; the shifted system is singular.")]
    DegenerateShift { index: usize },

    /// Wraps an error originating from [`faer`]'s eigendecomposition module.
    #[error("A numerical error occurred during an eigendecomposition: {0:?}")]
    EvdError(faer::linalg::evd::EvdError),
}

impl LogDetError {
    /// Returns `true` for errors caused by invalid arguments (dimensions, lengths,
    /// missing precomputation), as opposed to properties of the operator itself.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self.0,
            LogDetErrorKind::DimensionMismatch { .. }
                | LogDetErrorKind::ParameterMismatch { .. }
                | LogDetErrorKind::InputError(_)
        )
    }
}

// Manually implement PartialEq for the public error type.
// We compare the inner `LogDetErrorKind`.
impl PartialEq for LogDetError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
