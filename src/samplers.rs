//! Sampling vectors for the stochastic trace estimator.
//!
//! A [`TraceSampler`] provides `M` vectors `s_1, …, s_M` such that
//! `E[Σ_j s_jᵀ B s_j] = tr(B)` for any symmetric `B`. Summing `s_jᵀ log(A) s_j` over one
//! draw of all `M` vectors therefore gives one unbiased estimate of `log det(A)`.
//!
//! - [`GaussianSampler`]: `M` independent Gaussian vectors scaled by `1/√M` (Hutchinson).
//! - [`ProbingSampler`]: one vector per colour class of a distance-`p` colouring of the
//!   sparsity graph. Off-diagonal entries of `log(A)` between vertices of the same class
//!   decay with their graph distance, so the estimator variance drops sharply with `p`.

use crate::{
    algorithms::coloring::{Coloring, greedy_distance_coloring},
    error::{LogDetError, LogDetErrorKind},
    matrix::SparsityPattern,
};
use faer::Mat;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};
use std::sync::{Arc, OnceLock};

/// Produces the vectors of one trace estimate.
pub trait TraceSampler: Send + Sync {
    /// Length of every sampling vector.
    fn dimension(&self) -> usize;

    /// Number of vectors `M` that make up one estimate. Only meaningful once
    /// [`TraceSampler::precompute`] has succeeded.
    fn num_samples(&self) -> usize;

    /// One-off setup. Calling it again after it succeeded is a no-op.
    fn precompute(&self) -> Result<(), LogDetError>;

    /// Returns the `index`-th sampling vector as an `n × 1` column, drawing any
    /// randomness from `rng`.
    fn sample(&self, index: usize, rng: &mut dyn RngCore) -> Result<Mat<f64>, LogDetError>;
}

fn check_index(index: usize, num_samples: usize) -> Result<(), LogDetError> {
    if index >= num_samples {
        return Err(LogDetErrorKind::InputError(format!(
            "Sample index {index} is out of range for {num_samples} samples."
        ))
        .into());
    }
    Ok(())
}

/// Hutchinson sampler with Gaussian vectors of variance `1/M` per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaussianSampler {
    dimension: usize,
    num_samples: usize,
}

impl GaussianSampler {
    pub fn new(dimension: usize, num_samples: usize) -> Result<Self, LogDetError> {
        if dimension == 0 || num_samples == 0 {
            return Err(LogDetErrorKind::InputError(format!(
                "A Gaussian sampler needs a positive dimension and sample count, got \
                 {dimension} and {num_samples}."
            ))
            .into());
        }
        Ok(Self {
            dimension,
            num_samples,
        })
    }
}

impl TraceSampler for GaussianSampler {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn num_samples(&self) -> usize {
        self.num_samples
    }

    fn precompute(&self) -> Result<(), LogDetError> {
        Ok(())
    }

    fn sample(&self, index: usize, rng: &mut dyn RngCore) -> Result<Mat<f64>, LogDetError> {
        check_index(index, self.num_samples)?;
        let scale = 1.0 / (self.num_samples as f64).sqrt();
        Ok(Mat::from_fn(self.dimension, 1, |_, _| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            scale * z
        }))
    }
}

/// Where the probing colouring comes from.
enum ColoringSource {
    Pattern {
        pattern: Arc<dyn SparsityPattern>,
        power: usize,
    },
    Explicit,
}

/// Probing vectors supported on the colour classes of a distance-`p` colouring.
///
/// # Example
///
/// ```
/// use faer::sparse::{SparseColMat, Triplet};
/// use logdet_project::samplers::{ProbingSampler, TraceSampler};
/// use std::sync::Arc;
///
/// // Path graph on four vertices.
/// let triplets: Vec<_> = (0..4)
///     .map(|i| Triplet { row: i, col: i, val: 2.0 })
///     .chain((0..3).flat_map(|i| {
///         [Triplet { row: i, col: i + 1, val: -1.0 }, Triplet { row: i + 1, col: i, val: -1.0 }]
///     }))
///     .collect();
/// let a = SparseColMat::<usize, f64>::try_new_from_triplets(4, 4, &triplets).unwrap();
///
/// let sampler = ProbingSampler::new(Arc::new(a), 1).with_randomized_signs(false);
/// sampler.precompute().unwrap();
/// assert_eq!(sampler.num_samples(), 2);
/// ```
pub struct ProbingSampler {
    dimension: usize,
    source: ColoringSource,
    randomize_signs: bool,
    coloring: OnceLock<Coloring>,
}

impl ProbingSampler {
    /// Probes the pattern of `A^power`. A power of 0 yields a single all-ones class.
    pub fn new(pattern: Arc<dyn SparsityPattern>, power: usize) -> Self {
        Self {
            dimension: pattern.dimension(),
            source: ColoringSource::Pattern { pattern, power },
            randomize_signs: true,
            coloring: OnceLock::new(),
        }
    }

    /// Uses a precomputed colouring instead of colouring a sparsity pattern.
    pub fn from_coloring(coloring: Coloring) -> Self {
        let dimension = coloring.dimension();
        let cell = OnceLock::new();
        let _ = cell.set(coloring);
        Self {
            dimension,
            source: ColoringSource::Explicit,
            randomize_signs: true,
            coloring: cell,
        }
    }

    /// With randomized signs (the default) every probing vector carries independent
    /// Rademacher entries on its support, which makes the estimator unbiased. Without,
    /// the entries are all `+1` and the result is deterministic.
    pub fn with_randomized_signs(mut self, randomize_signs: bool) -> Self {
        self.randomize_signs = randomize_signs;
        self
    }

    /// The colouring, once available.
    pub fn coloring(&self) -> Option<&Coloring> {
        self.coloring.get()
    }
}

impl TraceSampler for ProbingSampler {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn num_samples(&self) -> usize {
        self.coloring.get().map_or(0, Coloring::num_colors)
    }

    fn precompute(&self) -> Result<(), LogDetError> {
        if self.coloring.get().is_some() {
            return Ok(());
        }
        let ColoringSource::Pattern { pattern, power } = &self.source else {
            return Ok(());
        };

        let coloring = if *power == 0 {
            Coloring::new(vec![0; self.dimension])?
        } else {
            greedy_distance_coloring(&pattern.adjacency(), *power)
        };
        log::info!(
            "Probing with {} colours (distance {power}, dimension {}).",
            coloring.num_colors(),
            self.dimension
        );
        let _ = self.coloring.set(coloring);
        Ok(())
    }

    fn sample(&self, index: usize, rng: &mut dyn RngCore) -> Result<Mat<f64>, LogDetError> {
        let coloring = self.coloring.get().ok_or_else(|| {
            LogDetError::from(LogDetErrorKind::InputError(
                "precompute() must succeed before sampling probing vectors.".to_string(),
            ))
        })?;
        check_index(index, coloring.num_colors())?;

        let mut s = Mat::zeros(self.dimension, 1);
        for vertex in coloring.class(index) {
            s[(vertex, 0)] = if self.randomize_signs && rng.random::<bool>() {
                -1.0
            } else {
                1.0
            };
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;
    use rand::{SeedableRng, rngs::StdRng};

    fn path_matrix(n: usize) -> Mat<f64> {
        Mat::from_fn(n, n, |i, j| match i.abs_diff(j) {
            0 => 2.0,
            1 => -1.0,
            _ => 0.0,
        })
    }

    #[test]
    fn test_gaussian_second_moment_is_identity() {
        let sampler = GaussianSampler::new(4, 5).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 4000;
        let mut second_moment: Mat<f64> = Mat::zeros(4, 4);
        for _ in 0..draws {
            for j in 0..sampler.num_samples() {
                let s = sampler.sample(j, &mut rng).unwrap();
                for i in 0..4 {
                    for k in 0..4 {
                        second_moment[(i, k)] += s[(i, 0)] * s[(k, 0)];
                    }
                }
            }
        }
        for i in 0..4 {
            for k in 0..4 {
                let expected = if i == k { 1.0 } else { 0.0 };
                let mean = second_moment[(i, k)] / draws as f64;
                assert!((mean - expected).abs() < 0.08, "({i}, {k}): {mean}");
            }
        }
    }

    #[test]
    fn test_probing_classes_cover_every_vertex_once() {
        let sampler = ProbingSampler::new(Arc::new(path_matrix(7)), 2);
        sampler.precompute().unwrap();
        assert_eq!(sampler.num_samples(), 3);

        let mut rng = StdRng::seed_from_u64(1);
        let mut coverage = vec![0; 7];
        for j in 0..sampler.num_samples() {
            let s = sampler.sample(j, &mut rng).unwrap();
            for (i, count) in coverage.iter_mut().enumerate() {
                if s[(i, 0)] != 0.0 {
                    assert_eq!(s[(i, 0)].abs(), 1.0);
                    *count += 1;
                }
            }
        }
        assert!(coverage.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_unsigned_probing_is_deterministic() {
        let coloring = Coloring::new(vec![0, 1, 2]).unwrap();
        let sampler = ProbingSampler::from_coloring(coloring).with_randomized_signs(false);
        sampler.precompute().unwrap();

        let mut rng = StdRng::seed_from_u64(99);
        let s = sampler.sample(1, &mut rng).unwrap();
        let expected: Mat<f64> = mat![[0.0], [1.0], [0.0]];
        assert_eq!(s, expected);
    }

    #[test]
    fn test_precompute_is_idempotent() {
        let sampler = ProbingSampler::new(Arc::new(path_matrix(10)), 1);
        sampler.precompute().unwrap();
        let first = sampler.coloring().unwrap().clone();
        sampler.precompute().unwrap();
        assert_eq!(&first, sampler.coloring().unwrap());
    }

    #[test]
    fn test_power_zero_uses_a_single_class() {
        let sampler = ProbingSampler::new(Arc::new(path_matrix(5)), 0);
        sampler.precompute().unwrap();
        assert_eq!(sampler.num_samples(), 1);
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let gaussian = GaussianSampler::new(3, 2).unwrap();
        assert!(gaussian.sample(2, &mut rng).unwrap_err().is_invalid_argument());

        let probing = ProbingSampler::new(Arc::new(path_matrix(3)), 1);
        assert!(probing.sample(0, &mut rng).is_err());
        probing.precompute().unwrap();
        assert!(probing.sample(2, &mut rng).unwrap_err().is_invalid_argument());
        assert!(GaussianSampler::new(0, 1).is_err());
    }
}
