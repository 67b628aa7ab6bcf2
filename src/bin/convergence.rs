//! Convergence experiment for the stochastic log-determinant estimators.
//!
//! For a shifted 2-D Laplacian (or a symmetric matrix read from a `.mtx` file) this runner
//! compares Gaussian (Hutchinson) sampling against probing vectors: for every requested
//! number of estimates it records the sample mean, its standard error and, when a
//! reference value is available, the absolute error. Both estimators share a single
//! rational approximation of `log(A)`, so the quadrature is built only once.
use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use faer::sparse::SparseColMat;
use logdet_project::{
    config::{CgmConfig, LanczosConfig},
    eigen::LanczosEigenSolver,
    estimator::LogDetEstimator,
    functions::{DenseExactLog, LogRationalApproximation, OperatorFunction},
    samplers::{GaussianSampler, ProbingSampler, TraceSampler},
    solvers::CgmSolver,
    utils::{
        generators::{laplacian_2d, laplacian_2d_log_determinant},
        matrix_market::load_matrix_market,
    },
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc, time::Instant};

/// Command-line arguments for the convergence experiment.
#[derive(Parser, Debug)]
#[clap(
    name = "convergence-runner",
    about = "Compares Gaussian and probing log-determinant estimators."
)]
struct ConvergenceArgs {
    /// Path to the output CSV file where results will be written.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,

    /// Symmetric positive-definite matrix in Matrix Market format. When omitted, a
    /// shifted 2-D Laplacian is generated instead.
    #[clap(long, value_name = "PATH")]
    matrix: Option<PathBuf>,

    /// Side length of the generated Laplacian grid.
    #[clap(long, default_value_t = 32)]
    grid: usize,

    /// Diagonal shift of the generated Laplacian.
    #[clap(long, default_value_t = 0.1)]
    shift: f64,

    /// Numbers of estimates to average, comma separated.
    #[clap(long, value_delimiter = ',', default_values_t = vec![1, 2, 4, 8, 16, 32])]
    estimates: Vec<usize>,

    /// Vectors per Gaussian estimate.
    #[clap(long, default_value_t = 8)]
    gaussian_samples: usize,

    /// Distance of the probing colouring.
    #[clap(long, default_value_t = 2)]
    probing_power: usize,

    /// Target accuracy of the rational approximation.
    #[clap(long, default_value_t = 1e-5)]
    accuracy: f64,

    #[clap(long, default_value_t = 42)]
    seed: u64,

    /// Largest dimension for which a loaded matrix gets a dense reference value.
    #[clap(long, default_value_t = 3000)]
    dense_limit: usize,

    /// Which samplers to run.
    #[clap(long, value_enum, value_delimiter = ',', default_values_t = vec![SamplerKind::Gaussian, SamplerKind::Probing])]
    samplers: Vec<SamplerKind>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum SamplerKind {
    Gaussian,
    Probing,
}

/// A single row of the output CSV.
#[derive(Debug, Serialize)]
struct ConvergenceResult {
    sampler: SamplerKind,
    vectors_per_estimate: usize,
    num_estimates: usize,
    mean: f64,
    standard_error: f64,
    reference: Option<f64>,
    abs_error: Option<f64>,
    time_s: f64,
}

/// Loads or generates the test matrix together with its exact log-determinant, if known.
fn build_problem(args: &ConvergenceArgs) -> Result<(SparseColMat<usize, f64>, Option<f64>)> {
    match &args.matrix {
        Some(path) => {
            let a = load_matrix_market(path)
                .with_context(|| format!("Failed to load matrix from {}", path.display()))?;
            if a.nrows() != a.ncols() {
                return Err(anyhow!(
                    "Matrix must be square, got {}x{}.",
                    a.nrows(),
                    a.ncols()
                ));
            }
            let reference = if a.nrows() <= args.dense_limit {
                log::info!("Computing dense reference log-determinant (n = {}).", a.nrows());
                Some(DenseExactLog::new(a.as_ref().to_dense())?.log_determinant()?)
            } else {
                log::info!("Dimension {} exceeds the dense limit; no reference.", a.nrows());
                None
            };
            Ok((a, reference))
        }
        None => {
            let a = laplacian_2d(args.grid, args.shift)?;
            Ok((a, Some(laplacian_2d_log_determinant(args.grid, args.shift))))
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    let args = ConvergenceArgs::parse();
    let (matrix, reference) = build_problem(&args)?;
    let n = matrix.nrows();
    log::info!("Problem dimension n = {n}, reference log det = {reference:?}.");

    let matrix = Arc::new(matrix);
    let function = Arc::new(LogRationalApproximation::new(
        matrix.clone(),
        Arc::new(LanczosEigenSolver::new(matrix.clone(), LanczosConfig::default())),
        Arc::new(CgmSolver::new(CgmConfig::default())),
        args.accuracy,
    ));
    function
        .precompute()
        .context("Failed to build the rational approximation of log(A)")?;

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    for &kind in &args.samplers {
        let sampler: Arc<dyn TraceSampler> = match kind {
            SamplerKind::Gaussian => Arc::new(GaussianSampler::new(n, args.gaussian_samples)?),
            SamplerKind::Probing => {
                Arc::new(ProbingSampler::new(matrix.clone(), args.probing_power))
            }
        };
        let estimator =
            LogDetEstimator::new(sampler.clone(), function.clone()).with_seed(args.seed);

        for &num_estimates in &args.estimates {
            log::info!("{kind:?}: running {num_estimates} estimates...");
            let start = Instant::now();
            let summary = estimator.summary(num_estimates)?;
            let time_s = start.elapsed().as_secs_f64();

            let abs_error = reference.map(|exact| (summary.mean - exact).abs());
            writer.serialize(ConvergenceResult {
                sampler: kind,
                vectors_per_estimate: sampler.num_samples(),
                num_estimates,
                mean: summary.mean,
                standard_error: summary.standard_error,
                reference,
                abs_error,
                time_s,
            })?;
        }
    }

    writer.flush()?;
    log::info!("Results written to {}.", args.output.display());
    Ok(())
}
