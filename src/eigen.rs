//! Spectral bounds for the rational approximation.
//!
//! The contour quadrature needs an interval `[λ_min, λ_max]` that contains the spectrum
//! of `A`. [`LanczosEigenSolver`] estimates it from the extremal Ritz values of a Lanczos
//! run, padded by a small relative margin; [`KnownSpectrum`] simply reports bounds the
//! caller already knows.

use crate::{
    algorithms::lanczos::{
        TridiagonalSystemView, lanczos_standard, ritz_extremes, tridiagonal_extremes,
    },
    config::LanczosConfig,
    error::{LogDetError, LogDetErrorKind},
    matrix::LinearOperator,
};
use faer::Mat;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};
use std::sync::Arc;

/// An interval that contains the spectrum of a symmetric operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralBounds {
    pub min: f64,
    pub max: f64,
}

impl SpectralBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, LogDetError> {
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(LogDetErrorKind::InputError(format!(
                "Invalid spectral bounds [{min}, {max}]."
            ))
            .into());
        }
        Ok(Self { min, max })
    }

    /// The spectral condition number `λ_max / λ_min`.
    pub fn condition_number(&self) -> f64 {
        self.max / self.min
    }
}

/// Computes the extreme eigenvalues of an operator.
pub trait EigenSolver: Send + Sync {
    /// Returns an interval containing the spectrum.
    fn compute(&self) -> Result<SpectralBounds, LogDetError>;

    fn min_eigenvalue(&self) -> Result<f64, LogDetError> {
        self.compute().map(|bounds| bounds.min)
    }

    fn max_eigenvalue(&self) -> Result<f64, LogDetError> {
        self.compute().map(|bounds| bounds.max)
    }
}

/// Fixed, caller-supplied spectral bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownSpectrum(pub SpectralBounds);

impl EigenSolver for KnownSpectrum {
    fn compute(&self) -> Result<SpectralBounds, LogDetError> {
        Ok(self.0)
    }
}

/// Estimates extreme eigenvalues with Lanczos (full reorthogonalization) from a seeded
/// Gaussian starting vector. Deterministic for a given seed.
pub struct LanczosEigenSolver {
    operator: Arc<dyn LinearOperator>,
    config: LanczosConfig,
}

impl LanczosEigenSolver {
    pub fn new(operator: Arc<dyn LinearOperator>, config: LanczosConfig) -> Self {
        Self { operator, config }
    }

    pub fn config(&self) -> &LanczosConfig {
        &self.config
    }
}

impl EigenSolver for LanczosEigenSolver {
    fn compute(&self) -> Result<SpectralBounds, LogDetError> {
        let n = self.operator.dimension();
        if n == 0 {
            return Err(LogDetErrorKind::InputError(
                "Cannot estimate the spectrum of an empty operator.".to_string(),
            )
            .into());
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let start: Mat<f64> = Mat::from_fn(n, 1, |_, _| StandardNormal.sample(&mut rng));

        let abs_tol = self.config.absolute_tolerance;
        let rel_tol = self.config.relative_tolerance;
        let mut previous: Option<(f64, f64)> = None;
        let mut settled = false;
        let mut ritz_error = None;

        // Stop as soon as both Ritz extremes have settled.
        let mut callback = |_steps: usize, view: &TridiagonalSystemView<'_>| {
            match tridiagonal_extremes(view.alphas, view.betas) {
                Ok((min, max)) => {
                    settled = previous.is_some_and(|(prev_min, prev_max)| {
                        (min - prev_min).abs() <= abs_tol + rel_tol * min.abs()
                            && (max - prev_max).abs() <= abs_tol + rel_tol * max.abs()
                    });
                    previous = Some((min, max));
                    !settled
                }
                Err(e) => {
                    ritz_error = Some(e);
                    false
                }
            }
        };
        let output = lanczos_standard(
            self.operator.as_ref(),
            start.as_ref(),
            self.config.max_iterations,
            Some(&mut callback),
        )?;
        if let Some(e) = ritz_error {
            return Err(e);
        }

        let decomposition = output.decomposition;
        let (mut min, mut max) =
            tridiagonal_extremes(&decomposition.alphas, &decomposition.betas)?;
        log::debug!(
            "Lanczos took {} steps; Ritz extremes [{min:.6e}, {max:.6e}].",
            decomposition.steps_taken
        );

        // Ritz values taken at the step limit may still lie well inside the spectrum.
        let hit_limit = !settled
            && decomposition.steps_taken < n
            && decomposition.steps_taken >= self.config.max_iterations;
        if hit_limit {
            let beta = decomposition.residual_beta.unwrap_or(0.0);
            let ritz = ritz_extremes(&decomposition.alphas, &decomposition.betas, beta)?;
            let fallback = ritz.min * self.config.unsettled_min_fraction;
            let lowered = ritz.min - ritz.min_residual;
            let new_min = if lowered > 0.0 { lowered.min(fallback) } else { fallback };
            log::warn!(
                "Lanczos reached {} steps before the spectral bounds settled \
                 (Ritz residuals {:.3e} / {:.3e}); widening [{min:.6e}, {max:.6e}] to \
                 [{new_min:.6e}, {:.6e}].",
                decomposition.steps_taken,
                ritz.min_residual,
                ritz.max_residual,
                max + ritz.max_residual,
            );
            min = new_min;
            max += ritz.max_residual;
        }

        let margin = self.config.spectral_margin;
        SpectralBounds::new(min - margin * min.abs(), max + margin * max.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::sparse::{SparseColMat, Triplet};

    fn diagonal(values: &[f64]) -> Arc<dyn LinearOperator> {
        let triplets: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, &val)| Triplet { row: i, col: i, val })
            .collect();
        Arc::new(
            SparseColMat::try_new_from_triplets(values.len(), values.len(), &triplets).unwrap(),
        )
    }

    #[test]
    fn test_lanczos_bounds_enclose_small_spectrum() {
        let solver = LanczosEigenSolver::new(
            diagonal(&[1.0, 2.0, 4.0]),
            LanczosConfig {
                spectral_margin: 0.0,
                ..LanczosConfig::default()
            },
        );
        let bounds = solver.compute().unwrap();
        assert!((bounds.min - 1.0).abs() < 1e-10);
        assert!((bounds.max - 4.0).abs() < 1e-10);
        assert!((solver.min_eigenvalue().unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_lanczos_bounds_on_larger_spectrum_with_margin() {
        let values: Vec<f64> = (0..200).map(|i| 0.5 + i as f64 * 0.05).collect();
        let solver = LanczosEigenSolver::new(diagonal(&values), LanczosConfig::default());
        let bounds = solver.compute().unwrap();

        // The margin must compensate for Ritz values converging from inside.
        assert!(bounds.min <= 0.5 + 1e-3);
        assert!(bounds.max >= 10.45 - 1e-3);
        assert!(bounds.min > 0.4);
        assert!(bounds.max < 10.7);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let operator = diagonal(&[3.0, 1.0, 7.0, 2.0, 5.0]);
        let solver = LanczosEigenSolver::new(operator, LanczosConfig::default());
        assert_eq!(solver.compute().unwrap(), solver.compute().unwrap());
    }

    #[test]
    fn test_invalid_bounds_are_rejected() {
        assert!(SpectralBounds::new(2.0, 1.0).is_err());
        assert!(SpectralBounds::new(f64::NAN, 1.0).is_err());
        let known = KnownSpectrum(SpectralBounds::new(1.0, 4.0).unwrap());
        assert_eq!(known.max_eigenvalue().unwrap(), 4.0);
    }
}
