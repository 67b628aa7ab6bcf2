//! Symmetric Lanczos tridiagonalization with full reorthogonalization.
//!
//! ** NOTE: We recommend using [`crate::eigen::LanczosEigenSolver`] instead. This module
//! is intended for use cases where fine-grained control over the Lanczos process is
//! required.
//!
//! The estimator only needs the extreme eigenvalues of `A` to place the quadrature
//! contour, and the number of steps this takes is small compared to the dimension. We
//! therefore keep the full basis `V_k` (O(nk) memory) and reorthogonalize every new
//! vector against it, which keeps the Ritz values free of the spurious copies that plain
//! three-term Lanczos produces once orthogonality is lost.
//!
//! The extremal Ritz values of `T_k` approach `λ_min` and `λ_max` from inside the
//! spectrum; [`tridiagonal_extremes`] computes them with `faer`'s self-adjoint
//! eigendecomposition.

use super::{axpy, breakdown_tolerance, cg_m::validate_rhs, dot};
use crate::{
    error::{LogDetError, LogDetErrorKind},
    matrix::LinearOperator,
};
use faer::{Side, prelude::*, unzip, zip};

/// The scalar output of a Lanczos run: the coefficients of `T_k`.
#[derive(Debug, Clone, PartialEq)]
pub struct LanczosDecomposition {
    /// Diagonal of `T_k`.
    pub alphas: Vec<f64>,
    /// Off-diagonal of `T_k` (length `steps_taken - 1`).
    pub betas: Vec<f64>,
    pub steps_taken: usize,
    /// Norm of the starting vector.
    pub b_norm: f64,
    /// `β_k`, the coupling of `T_k` to the next Lanczos vector. `None` when a callback
    /// stopped the run before it was computed.
    pub residual_beta: Option<f64>,
}

/// Extremal Ritz values of `T_k` with their residual norms `|β_k e_kᵀ y|`.
///
/// Each interval `[θ - r, θ + r]` contains at least one eigenvalue of `A`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RitzExtremes {
    pub min: f64,
    pub min_residual: f64,
    pub max: f64,
    pub max_residual: f64,
}

/// The full output of [`lanczos_standard`].
#[derive(Debug, Clone)]
pub struct LanczosOutput {
    /// Orthonormal basis of the Krylov subspace, one column per step.
    pub v_k: Mat<f64>,
    pub decomposition: LanczosDecomposition,
}

/// A read-only view of the tridiagonal matrix built so far, handed to callbacks.
#[derive(Debug, Clone, Copy)]
pub struct TridiagonalSystemView<'a> {
    pub alphas: &'a [f64],
    pub betas: &'a [f64],
    pub steps_taken: usize,
}

/// Invoked after every step; returning `false` stops the iteration.
pub type LanczosCallback<'a> = dyn FnMut(usize, &TridiagonalSystemView<'_>) -> bool + 'a;

/// Performs up to `k` steps of symmetric Lanczos starting from `b`.
///
/// # Arguments
/// * `operator`: A symmetric linear operator.
/// * `b`: The starting vector. Must not be a zero vector.
/// * `k`: The maximum number of steps; at most `n` steps are taken.
/// * `callback`: Optional hook to monitor `T_k` and stop early.
///
/// # Returns
/// The basis `V_k` and the coefficients of `T_k`. The iteration stops early when the
/// Krylov subspace becomes invariant (`β ≈ 0`), in which case the Ritz values are exact.
pub fn lanczos_standard(
    operator: &dyn LinearOperator,
    b: MatRef<'_, f64>,
    k: usize,
    mut callback: Option<&mut LanczosCallback<'_>>,
) -> Result<LanczosOutput, LogDetError> {
    validate_rhs(operator, b)?;
    if k == 0 {
        return Err(LogDetErrorKind::InputError(
            "The number of Lanczos steps must be positive.".to_string(),
        )
        .into());
    }
    let b_norm = b.norm_l2();
    if b_norm == 0.0 || !b_norm.is_finite() {
        return Err(LogDetErrorKind::InputError(
            "The initial vector `b` must not be a zero vector.".to_string(),
        )
        .into());
    }

    let n = b.nrows();
    let k = k.min(n);
    let mut v_k = Mat::<f64>::zeros(n, k);
    zip!(v_k.col_mut(0), b.col(0)).for_each(|unzip!(v, b)| *v = *b / b_norm);

    let mut alphas: Vec<f64> = Vec::with_capacity(k);
    let mut betas: Vec<f64> = Vec::with_capacity(k.saturating_sub(1));
    let mut steps_taken = 0;
    let mut residual_beta = None;

    for i in 0..k {
        let v_i = v_k.as_ref().get(.., i..i + 1);
        let mut w = operator.apply(v_i);
        let alpha = dot(v_i, w.as_ref());
        axpy(&mut w, -alpha, v_i);
        if i > 0 {
            axpy(&mut w, -betas[i - 1], v_k.as_ref().get(.., i - 1..i));
        }

        // Full reorthogonalization against every stored basis vector.
        for j in 0..=i {
            let v_j = v_k.as_ref().get(.., j..j + 1);
            let overlap = dot(v_j, w.as_ref());
            axpy(&mut w, -overlap, v_j);
        }

        alphas.push(alpha);
        steps_taken += 1;

        if let Some(ref mut cb) = callback {
            let t_k_view = TridiagonalSystemView {
                alphas: &alphas,
                betas: &betas,
                steps_taken,
            };
            if !cb(steps_taken, &t_k_view) {
                residual_beta = None;
                break;
            }
        }

        let beta = w.norm_l2();
        residual_beta = Some(beta);
        let scale = alphas.iter().fold(1.0f64, |acc, a| acc.max(a.abs()));
        if beta <= breakdown_tolerance() * scale {
            break;
        }

        if i < k - 1 {
            betas.push(beta);
            zip!(v_k.col_mut(i + 1), w.col(0)).for_each(|unzip!(v, w)| *v = *w / beta);
        }
    }

    let final_v_k = if steps_taken == k {
        v_k
    } else {
        v_k.as_ref().get(.., 0..steps_taken).to_owned()
    };

    Ok(LanczosOutput {
        v_k: final_v_k,
        decomposition: LanczosDecomposition {
            alphas,
            betas,
            steps_taken,
            b_norm,
            residual_beta,
        },
    })
}

/// Assembles the dense symmetric tridiagonal matrix `T_k`.
pub fn assemble_tridiagonal(alphas: &[f64], betas: &[f64]) -> Mat<f64> {
    let steps = alphas.len();
    let mut t_k = Mat::zeros(steps, steps);
    for (i, &alpha) in alphas.iter().enumerate() {
        t_k[(i, i)] = alpha;
    }
    for (i, &beta) in betas.iter().enumerate().take(steps.saturating_sub(1)) {
        t_k[(i, i + 1)] = beta;
        t_k[(i + 1, i)] = beta;
    }
    t_k
}

/// Returns the smallest and largest eigenvalue (Ritz value) of `T_k`.
pub fn tridiagonal_extremes(alphas: &[f64], betas: &[f64]) -> Result<(f64, f64), LogDetError> {
    if alphas.is_empty() {
        return Err(LogDetErrorKind::InputError(
            "Cannot compute Ritz values of an empty tridiagonal matrix.".to_string(),
        )
        .into());
    }
    let t_k = assemble_tridiagonal(alphas, betas);
    let evd = t_k
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| LogDetError::from(LogDetErrorKind::EvdError(e)))?;
    let eigenvalues = evd.S();

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for i in 0..alphas.len() {
        let lambda = eigenvalues[i];
        min = min.min(lambda);
        max = max.max(lambda);
    }
    Ok((min, max))
}

/// Computes the extremal Ritz pairs of `T_k` and bounds their residuals with
/// `residual_beta` (see [`LanczosDecomposition::residual_beta`]).
pub fn ritz_extremes(
    alphas: &[f64],
    betas: &[f64],
    residual_beta: f64,
) -> Result<RitzExtremes, LogDetError> {
    if alphas.is_empty() {
        return Err(LogDetErrorKind::InputError(
            "Cannot compute Ritz values of an empty tridiagonal matrix.".to_string(),
        )
        .into());
    }
    let steps = alphas.len();
    let t_k = assemble_tridiagonal(alphas, betas);
    let evd = t_k
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| LogDetError::from(LogDetErrorKind::EvdError(e)))?;
    let eigenvalues = evd.S();
    let eigenvectors = evd.U();

    let mut i_min = 0;
    let mut i_max = 0;
    for i in 1..steps {
        if eigenvalues[i] < eigenvalues[i_min] {
            i_min = i;
        }
        if eigenvalues[i] > eigenvalues[i_max] {
            i_max = i;
        }
    }
    let residual = |j: usize| (residual_beta * eigenvectors[(steps - 1, j)]).abs();

    Ok(RitzExtremes {
        min: eigenvalues[i_min],
        min_residual: residual(i_min),
        max: eigenvalues[i_max],
        max_residual: residual(i_max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::{mat, sparse::SparseColMat, sparse::Triplet};

    fn diagonal(values: &[f64]) -> SparseColMat<usize, f64> {
        let triplets: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, &val)| Triplet { row: i, col: i, val })
            .collect();
        SparseColMat::try_new_from_triplets(values.len(), values.len(), &triplets).unwrap()
    }

    #[test]
    fn test_basis_is_orthonormal() {
        let values: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let a = diagonal(&values);
        let b = Mat::from_fn(30, 1, |i, _| 1.0 + 0.1 * i as f64);

        let output = lanczos_standard(&a, b.as_ref(), 10, None).unwrap();
        assert_eq!(output.decomposition.steps_taken, 10);
        assert_eq!(output.decomposition.betas.len(), 9);

        let gram = output.v_k.transpose() * output.v_k.as_ref();
        let identity = Mat::<f64>::from_fn(10, 10, |i, j| if i == j { 1.0 } else { 0.0 });
        assert!((&gram - &identity).norm_l2() < 1e-10);
    }

    #[test]
    fn test_invariant_subspace_gives_exact_extremes() {
        let a = diagonal(&[1.0, 2.0, 4.0]);
        let b: Mat<f64> = mat![[1.0], [1.0], [1.0]];
        let output = lanczos_standard(&a, b.as_ref(), 10, None).unwrap();
        assert_eq!(output.decomposition.steps_taken, 3);

        let (min, max) =
            tridiagonal_extremes(&output.decomposition.alphas, &output.decomposition.betas)
                .unwrap();
        assert!((min - 1.0).abs() < 1e-10);
        assert!((max - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_ritz_residuals_bound_distance_to_spectrum() {
        let values: Vec<f64> = (1..=40).map(|i| (i * i) as f64).collect();
        let a = diagonal(&values);
        let b = Mat::from_fn(40, 1, |i, _| 1.0 + 0.05 * i as f64);
        let output = lanczos_standard(&a, b.as_ref(), 6, None).unwrap();
        let decomposition = &output.decomposition;
        let beta = decomposition.residual_beta.unwrap();
        assert!(beta > 0.0);

        let ritz = ritz_extremes(&decomposition.alphas, &decomposition.betas, beta).unwrap();
        let distance = |theta: f64| {
            values
                .iter()
                .map(|lambda| (lambda - theta).abs())
                .fold(f64::INFINITY, f64::min)
        };
        assert!(distance(ritz.min) <= ritz.min_residual + 1e-8);
        assert!(distance(ritz.max) <= ritz.max_residual + 1e-8);
        assert!(ritz.min >= 1.0 && ritz.max <= 1600.0);

        let (min, max) = tridiagonal_extremes(&decomposition.alphas, &decomposition.betas).unwrap();
        assert!((min - ritz.min).abs() < 1e-10 && (max - ritz.max).abs() < 1e-10);
    }

    #[test]
    fn test_callback_stops_iteration() {
        let values: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let a = diagonal(&values);
        let b = Mat::from_fn(20, 1, |_, _| 1.0);

        let mut calls = 0;
        let mut callback = |steps: usize, view: &TridiagonalSystemView<'_>| {
            calls += 1;
            assert_eq!(view.alphas.len(), steps);
            steps < 4
        };
        let output = lanczos_standard(&a, b.as_ref(), 20, Some(&mut callback)).unwrap();
        assert_eq!(output.decomposition.steps_taken, 4);
        assert_eq!(output.v_k.ncols(), 4);
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_zero_start_vector_is_rejected() {
        let a = diagonal(&[1.0, 2.0]);
        let b = Mat::<f64>::zeros(2, 1);
        let err = lanczos_standard(&a, b.as_ref(), 2, None).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
