//! Configuration structures for the solvers and the estimator.
//!
//! All structures implement [`Default`] with the values used by the convenience
//! constructor [`crate::estimator::LogDetEstimator::from_sparse`], and derive `serde`
//! traits so experiment drivers can record the exact settings next to their results.

use serde::{Deserialize, Serialize};

/// Stopping rules for the CG and CG-M iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CgmConfig {
    /// Hard cap on the number of iterations (matrix-vector products).
    pub max_iterations: usize,
    /// Stop once `‖r‖ ≤ relative_tolerance · ‖b‖`.
    pub relative_tolerance: f64,
    /// Stop once `‖r‖ ≤ absolute_tolerance`.
    pub absolute_tolerance: f64,
    /// Keep the residual norm of every iteration in [`crate::algorithms::SolveStats`].
    pub record_residuals: bool,
}

impl Default for CgmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            relative_tolerance: 1e-10,
            absolute_tolerance: 1e-14,
            record_residuals: false,
        }
    }
}

/// Settings of the Lanczos eigen-solver used to bound the spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanczosConfig {
    /// Maximum number of Lanczos steps; capped by the operator dimension.
    pub max_iterations: usize,
    /// The iteration stops when both Ritz extremes move by less than
    /// `absolute_tolerance + relative_tolerance · |λ|` in one step.
    pub absolute_tolerance: f64,
    pub relative_tolerance: f64,
    /// Relative padding applied to the Ritz bounds, `[λ_min(1-m), λ_max(1+m)]`.
    /// Lanczos approaches the extremes from inside the spectrum.
    pub spectral_margin: f64,
    /// When the step limit is reached before the Ritz extremes settle, `λ_min` is
    /// lowered to at most this fraction of the smallest Ritz value.
    pub unsettled_min_fraction: f64,
    /// Seed of the random starting vector.
    pub seed: u64,
}

impl Default for LanczosConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            absolute_tolerance: 1e-10,
            relative_tolerance: 1e-8,
            spectral_margin: 1e-2,
            unsettled_min_fraction: 1e-2,
            seed: 0x5EED,
        }
    }
}

/// Settings of the end-to-end log-determinant estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDetConfig {
    /// Target accuracy of the rational approximation of `log` on the spectrum.
    pub accuracy: f64,
    /// The probing sampler colours the sparsity pattern of `A^probing_power`.
    pub probing_power: usize,
    /// Draw Rademacher signs for probing vectors instead of using all-ones.
    pub randomize_signs: bool,
    /// Base seed for the per-estimate random generators; `None` draws one per run.
    pub seed: Option<u64>,
    pub solver: CgmConfig,
    pub eigen: LanczosConfig,
}

impl Default for LogDetConfig {
    fn default() -> Self {
        Self {
            accuracy: 1e-5,
            probing_power: 1,
            randomize_signs: true,
            seed: None,
            solver: CgmConfig::default(),
            eigen: LanczosConfig::default(),
        }
    }
}
