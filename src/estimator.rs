//! Stochastic estimation of `log det(A)`.
//!
//! One estimate is `Σ_{j<M} s_jᵀ log(A) s_j` for the `M` vectors of a [`TraceSampler`],
//! each quadratic form evaluated by an [`OperatorFunction`]. Independent estimates run in
//! parallel on the rayon pool; the vectors inside one estimate are processed
//! sequentially. Every estimate owns a random generator seeded from the run seed and its
//! index, so a seeded run returns the same values regardless of scheduling.

use crate::{
    config::LogDetConfig,
    eigen::LanczosEigenSolver,
    error::{LogDetError, LogDetErrorKind},
    functions::{LogRationalApproximation, OperatorFunction},
    samplers::{ProbingSampler, TraceSampler},
    solvers::CgmSolver,
};
use faer::{Mat, sparse::SparseColMat};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use std::sync::Arc;

/// Mean and spread of a batch of estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDetSummary {
    pub estimates: Vec<f64>,
    pub mean: f64,
    /// Standard error of the mean; zero for a single estimate.
    pub standard_error: f64,
}

impl LogDetSummary {
    fn from_estimates(estimates: Vec<f64>) -> Self {
        let count = estimates.len() as f64;
        let mean = estimates.iter().sum::<f64>() / count;
        let standard_error = if estimates.len() > 1 {
            let variance =
                estimates.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1.0);
            (variance / count).sqrt()
        } else {
            0.0
        };
        Self {
            estimates,
            mean,
            standard_error,
        }
    }
}

/// Combines a trace sampler and an operator function into log-determinant estimates.
///
/// # Example
///
/// ```
/// use faer::sparse::{SparseColMat, Triplet};
/// use logdet_project::estimator::LogDetEstimator;
///
/// let triplets = [
///     Triplet { row: 0, col: 0, val: 1.0 },
///     Triplet { row: 1, col: 1, val: 2.0 },
///     Triplet { row: 2, col: 2, val: 4.0 },
/// ];
/// let a = SparseColMat::<usize, f64>::try_new_from_triplets(3, 3, &triplets).unwrap();
///
/// let estimator = LogDetEstimator::from_sparse(a).with_seed(42);
/// let estimates = estimator.sample(2).unwrap();
/// assert!((estimates[0] - 8.0f64.ln()).abs() < 1e-3);
/// ```
pub struct LogDetEstimator {
    trace_sampler: Arc<dyn TraceSampler>,
    operator_function: Arc<dyn OperatorFunction>,
    seed: Option<u64>,
}

impl LogDetEstimator {
    pub fn new(
        trace_sampler: Arc<dyn TraceSampler>,
        operator_function: Arc<dyn OperatorFunction>,
    ) -> Self {
        Self {
            trace_sampler,
            operator_function,
            seed: None,
        }
    }

    /// Probing estimator with the default configuration.
    pub fn from_sparse(matrix: SparseColMat<usize, f64>) -> Self {
        Self::from_sparse_with_config(matrix, &LogDetConfig::default())
    }

    /// Wires a Lanczos spectrum estimate, CG-M, the rational `log` approximation and a
    /// probing sampler on the pattern of `A^probing_power`.
    pub fn from_sparse_with_config(
        matrix: SparseColMat<usize, f64>,
        config: &LogDetConfig,
    ) -> Self {
        let matrix = Arc::new(matrix);
        let eigen_solver = LanczosEigenSolver::new(matrix.clone(), config.eigen.clone());
        let function = LogRationalApproximation::new(
            matrix.clone(),
            Arc::new(eigen_solver),
            Arc::new(CgmSolver::new(config.solver.clone())),
            config.accuracy,
        );
        let sampler = ProbingSampler::new(matrix, config.probing_power)
            .with_randomized_signs(config.randomize_signs);

        Self {
            trace_sampler: Arc::new(sampler),
            operator_function: Arc::new(function),
            seed: config.seed,
        }
    }

    /// Fixes the base seed of the per-estimate random generators.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn trace_sampler(&self) -> &Arc<dyn TraceSampler> {
        &self.trace_sampler
    }

    pub fn operator_function(&self) -> &Arc<dyn OperatorFunction> {
        &self.operator_function
    }

    /// Returns `num_estimates` independent estimates of `log det(A)`.
    ///
    /// Each estimate is the plain sum over the sampler's vectors; the samplers carry
    /// their own normalization.
    pub fn sample(&self, num_estimates: usize) -> Result<Vec<f64>, LogDetError> {
        let rows = self.run(num_estimates)?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let estimate: f64 = row.iter().sum();
                if !estimate.is_finite() {
                    log::warn!("Estimate {i} is not finite ({estimate}).");
                }
                estimate
            })
            .collect())
    }

    /// Returns the individual terms `s_jᵀ log(A) s_j` as a
    /// `num_estimates × num_samples` matrix; row `i` sums to the `i`-th estimate.
    pub fn sample_without_averaging(
        &self,
        num_estimates: usize,
    ) -> Result<Mat<f64>, LogDetError> {
        let rows = self.run(num_estimates)?;
        let num_samples = self.trace_sampler.num_samples();
        Ok(Mat::from_fn(num_estimates, num_samples, |i, j| rows[i][j]))
    }

    /// Runs [`LogDetEstimator::sample`] and summarizes the estimates.
    pub fn summary(&self, num_estimates: usize) -> Result<LogDetSummary, LogDetError> {
        self.sample(num_estimates).map(LogDetSummary::from_estimates)
    }

    /// Validates, precomputes, and evaluates every quadratic form of every estimate.
    fn run(&self, num_estimates: usize) -> Result<Vec<Vec<f64>>, LogDetError> {
        if num_estimates == 0 {
            return Err(LogDetErrorKind::InputError(
                "The number of estimates must be positive.".to_string(),
            )
            .into());
        }
        let dimension = self.operator_function.dimension();
        if self.trace_sampler.dimension() != dimension {
            return Err(LogDetErrorKind::DimensionMismatch {
                expected: dimension,
                actual: self.trace_sampler.dimension(),
            }
            .into());
        }

        self.trace_sampler.precompute()?;
        self.operator_function.precompute()?;

        let num_samples = self.trace_sampler.num_samples();
        let base_seed = self.seed.unwrap_or_else(|| rand::rng().random());
        log::info!(
            "Computing {num_estimates} log-determinant estimates of dimension {dimension} \
             with {num_samples} vectors each."
        );

        (0..num_estimates)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(estimate_seed(base_seed, i));
                (0..num_samples)
                    .map(|j| {
                        let s = self.trace_sampler.sample(j, &mut rng)?;
                        self.operator_function.compute(s.as_ref())
                    })
                    .collect::<Result<Vec<f64>, LogDetError>>()
            })
            .collect()
    }
}

/// Derives the seed of estimate `index` from the run seed (SplitMix64 finalizer).
fn estimate_seed(base: u64, index: usize) -> u64 {
    let mut z = base.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::coloring::Coloring,
        eigen::{KnownSpectrum, SpectralBounds},
        functions::DenseExactLog,
        samplers::GaussianSampler,
    };
    use faer::{mat, sparse::Triplet};

    fn diag_124() -> Mat<f64> {
        mat![[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 4.0]]
    }

    fn rational_diag_124() -> Arc<dyn OperatorFunction> {
        Arc::new(LogRationalApproximation::new(
            Arc::new(diag_124()),
            Arc::new(KnownSpectrum(SpectralBounds::new(1.0, 4.0).unwrap())),
            Arc::new(CgmSolver::default()),
            1e-5,
        ))
    }

    #[test]
    fn test_three_colour_probing_recovers_log_determinant() {
        let sampler = ProbingSampler::from_coloring(Coloring::new(vec![0, 1, 2]).unwrap());
        let estimator = LogDetEstimator::new(Arc::new(sampler), rational_diag_124());
        let estimates = estimator.sample(1).unwrap();
        assert_eq!(estimates.len(), 1);
        assert!((estimates[0] - 8.0f64.ln()).abs() < 1e-3);
    }

    #[test]
    fn test_from_sparse_on_diagonal_matrix() {
        let triplets: Vec<_> = [1.0, 2.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &val)| Triplet { row: i, col: i, val })
            .collect();
        let a = SparseColMat::try_new_from_triplets(3, 3, &triplets).unwrap();
        let estimates = LogDetEstimator::from_sparse(a).with_seed(3).sample(4).unwrap();
        for estimate in estimates {
            assert!((estimate - 8.0f64.ln()).abs() < 1e-3);
        }
    }

    #[test]
    fn test_terms_sum_to_estimates() {
        let sampler = GaussianSampler::new(3, 4).unwrap();
        let exact = DenseExactLog::new(diag_124()).unwrap();
        let estimator = LogDetEstimator::new(Arc::new(sampler), Arc::new(exact)).with_seed(11);

        let estimates = estimator.sample(5).unwrap();
        let terms = estimator.sample_without_averaging(5).unwrap();
        assert_eq!((terms.nrows(), terms.ncols()), (5, 4));
        for (i, estimate) in estimates.iter().enumerate() {
            let row_sum: f64 = (0..4).map(|j| terms[(i, j)]).sum();
            assert!((row_sum - estimate).abs() < 1e-12);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let make = || {
            LogDetEstimator::new(
                Arc::new(GaussianSampler::new(3, 2).unwrap()),
                Arc::new(DenseExactLog::new(diag_124()).unwrap()),
            )
            .with_seed(2024)
        };
        let first = make().sample(16).unwrap();
        assert_eq!(first, make().sample(16).unwrap());
        assert!(first.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_summary_statistics() {
        let summary = LogDetSummary::from_estimates(vec![1.0, 2.0, 3.0]);
        assert_eq!(summary.mean, 2.0);
        assert!((summary.standard_error - (1.0f64 / 3.0).sqrt()).abs() < 1e-15);
        assert_eq!(LogDetSummary::from_estimates(vec![4.0]).standard_error, 0.0);
    }

    #[test]
    fn test_invalid_arguments_fail_fast() {
        let estimator = LogDetEstimator::new(
            Arc::new(GaussianSampler::new(2, 1).unwrap()),
            rational_diag_124(),
        );
        assert_eq!(
            estimator.sample(1).unwrap_err(),
            LogDetError::from(LogDetErrorKind::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );

        let estimator = LogDetEstimator::new(
            Arc::new(GaussianSampler::new(3, 1).unwrap()),
            rational_diag_124(),
        );
        assert!(estimator.sample(0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_estimate_seeds_differ() {
        let seeds: Vec<u64> = (0..64).map(|i| estimate_seed(7, i)).collect();
        let mut unique = seeds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seeds.len());
    }
}
