//! Conjugate gradients for a single system and for a family of shifted systems (CG-M).
//!
//! ** NOTE: We recommend using [`crate::solvers::CgmSolver`] instead. This module exposes
//! the raw iterations together with their [`SolveStats`].
//!
//! For a symmetric `A`, the Krylov spaces `K_k(A, b)` and `K_k(A + σI, b)` coincide for
//! every scalar `σ`. CG-M exploits this: it runs the ordinary CG recurrence for the
//! unshifted system and, for every shift, derives the shifted residuals as scalar
//! multiples `ζ_k · r` of the unshifted one. Each extra shift therefore costs a few
//! scalar recurrences and two vector updates per iteration, but no extra matrix-vector
//! product.
//!
//! The step convention follows the "negative step" form of the recurrence:
//!
//! ```text
//! β      = -‖r‖² / pᵀAp
//! ζ_new  = ζ_cur ζ_old β_old / (β α (ζ_old - ζ_cur) + ζ_old β_old (1 - β σ))
//! β_σ    = β ζ_new / ζ_cur                x_σ ← x_σ - β_σ p_σ
//! r      ← r + β A p                       α = ‖r_new‖² / ‖r_old‖²
//! α_σ    = α ζ_new β_σ / (ζ_cur β)         p_σ ← α_σ p_σ + ζ_new r
//! ```
//!
//! Convergence is monitored on the unshifted residual. A shift whose own residual
//! `|ζ| ‖r‖` has already met the tolerance is frozen, which also keeps `ζ` away from
//! underflow on long runs.

use super::{SolveStats, Termination, axpy, dot, to_complex, update_direction};
use crate::{
    config::CgmConfig,
    error::{LogDetError, LogDetErrorKind},
    matrix::LinearOperator,
};
use faer::{Mat, MatRef, c64, unzip, zip};
use std::sync::atomic::{AtomicBool, Ordering};

/// The output of a shifted-family solve: the weighted combination and its statistics.
#[derive(Debug, Clone)]
pub struct ShiftedSolveOutput {
    /// `Σ_k w_k x_k`.
    pub solution: Mat<c64>,
    pub stats: SolveStats,
}

/// Per-call iteration state of CG-M.
///
/// Allocated fresh by every call to [`cg_m`], so concurrent solves never share buffers.
struct ShiftedState {
    x: Vec<Mat<c64>>,
    p: Vec<Mat<c64>>,
    zeta_old: Vec<c64>,
    zeta_cur: Vec<c64>,
    zeta_new: Vec<c64>,
    beta: Vec<c64>,
    active: Vec<bool>,
}

impl ShiftedState {
    fn new(b: MatRef<'_, f64>, num_shifts: usize) -> Self {
        let one = c64::new(1.0, 0.0);
        let b_complex = to_complex(b);
        Self {
            x: vec![Mat::zeros(b.nrows(), 1); num_shifts],
            p: vec![b_complex; num_shifts],
            zeta_old: vec![one; num_shifts],
            zeta_cur: vec![one; num_shifts],
            zeta_new: vec![one; num_shifts],
            beta: vec![c64::new(0.0, 0.0); num_shifts],
            active: vec![true; num_shifts],
        }
    }
}

pub(crate) fn validate_rhs(
    operator: &dyn LinearOperator,
    b: MatRef<'_, f64>,
) -> Result<(), LogDetError> {
    if b.ncols() != 1 {
        return Err(LogDetErrorKind::InputError(format!(
            "The right-hand side must be a single column, got {} columns.",
            b.ncols()
        ))
        .into());
    }
    if operator.dimension() != b.nrows() {
        return Err(LogDetErrorKind::DimensionMismatch {
            expected: operator.dimension(),
            actual: b.nrows(),
        }
        .into());
    }
    Ok(())
}

#[inline]
fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn stopping_threshold(config: &CgmConfig, b_norm: f64) -> f64 {
    (config.relative_tolerance * b_norm).max(config.absolute_tolerance)
}

fn report(stats: &SolveStats, kind: &str) {
    match stats.termination {
        Termination::Converged => log::debug!(
            "{kind} converged after {} iterations (residual {:.3e}).",
            stats.iterations,
            stats.final_residual_norm
        ),
        Termination::Breakdown => log::warn!(
            "{kind} broke down at iteration {} (pᵀAp = 0); returning the current iterate \
             with residual {:.3e}.",
            stats.iterations + 1,
            stats.final_residual_norm
        ),
        Termination::MaxIterations => log::warn!(
            "{kind} did not converge within {} iterations (residual {:.3e}).",
            stats.iterations,
            stats.final_residual_norm
        ),
        Termination::Cancelled => log::info!(
            "{kind} cancelled after {} iterations (residual {:.3e}).",
            stats.iterations,
            stats.final_residual_norm
        ),
    }
}

/// Solves `A x = b` with the conjugate gradient method, starting from `x = 0`.
///
/// # Arguments
/// * `operator`: A symmetric positive-definite linear operator.
/// * `b`: The right-hand side, an `n × 1` column.
/// * `config`: Iteration limit and tolerances.
/// * `cancel`: Optional flag polled once per iteration.
///
/// # Returns
/// The final iterate and its [`SolveStats`]. Breakdown, non-convergence and
/// cancellation are not errors; they are reported in `stats.termination` and logged.
pub fn conjugate_gradient(
    operator: &dyn LinearOperator,
    b: MatRef<'_, f64>,
    config: &CgmConfig,
    cancel: Option<&AtomicBool>,
) -> Result<(Mat<f64>, SolveStats), LogDetError> {
    validate_rhs(operator, b)?;

    let n = b.nrows();
    let b_norm = b.norm_l2();
    let mut x = Mat::<f64>::zeros(n, 1);
    let mut residual_norms = Vec::new();
    if config.record_residuals {
        residual_norms.push(b_norm);
    }

    if b_norm == 0.0 {
        return Ok((
            x,
            SolveStats {
                iterations: 0,
                residual_norms,
                final_residual_norm: 0.0,
                termination: Termination::Converged,
            },
        ));
    }

    let threshold = stopping_threshold(config, b_norm);
    let mut r = b.to_owned();
    let mut p = r.clone();
    let mut r_norm2 = b_norm * b_norm;
    let mut iterations = 0;
    let mut termination = Termination::MaxIterations;

    while iterations < config.max_iterations {
        if is_cancelled(cancel) {
            termination = Termination::Cancelled;
            break;
        }

        let ap = operator.apply(p.as_ref());
        let p_ap = dot(p.as_ref(), ap.as_ref());
        if p_ap == 0.0 || !p_ap.is_finite() {
            termination = Termination::Breakdown;
            break;
        }
        let beta = -r_norm2 / p_ap;

        axpy(&mut x, -beta, p.as_ref());
        axpy(&mut r, beta, ap.as_ref());
        let r_norm2_new = dot(r.as_ref(), r.as_ref());
        iterations += 1;
        if config.record_residuals {
            residual_norms.push(r_norm2_new.sqrt());
        }

        if r_norm2_new == 0.0 || r_norm2_new.sqrt() <= threshold {
            r_norm2 = r_norm2_new;
            termination = Termination::Converged;
            break;
        }

        let alpha = r_norm2_new / r_norm2;
        r_norm2 = r_norm2_new;
        update_direction(&mut p, alpha, r.as_ref());
    }

    let stats = SolveStats {
        iterations,
        residual_norms,
        final_residual_norm: r_norm2.sqrt(),
        termination,
    };
    report(&stats, "CG");
    Ok((x, stats))
}

/// Computes `Σ_k weights[k] · x_k` where `(A + shifts[k] I) x_k = b`
/// (`A - shifts[k] I` when `negate` is set), using a single shared Krylov iteration.
///
/// # Arguments
/// * `operator`: A symmetric linear operator; it is only accessed through `apply`.
/// * `b`: The real right-hand side, an `n × 1` column.
/// * `shifts`, `weights`: Complex shifts and their weights, of equal length.
/// * `negate`: Solve with `-σ_k` instead of `σ_k`.
/// * `config`: Iteration limit and tolerances for the unshifted residual.
/// * `cancel`: Optional flag polled once per iteration.
///
/// # Returns
/// A [`ShiftedSolveOutput`] with the weighted solution, or a [`LogDetError`] if the
/// arguments are inconsistent. Numerical breakdown returns the current iterate.
pub fn cg_m(
    operator: &dyn LinearOperator,
    b: MatRef<'_, f64>,
    shifts: &[c64],
    weights: &[c64],
    negate: bool,
    config: &CgmConfig,
    cancel: Option<&AtomicBool>,
) -> Result<ShiftedSolveOutput, LogDetError> {
    validate_rhs(operator, b)?;
    if shifts.len() != weights.len() {
        return Err(LogDetErrorKind::ParameterMismatch {
            param_name: "weights".to_string(),
            expected: shifts.len(),
            actual: weights.len(),
        }
        .into());
    }

    let n = b.nrows();
    let num_shifts = shifts.len();
    let b_norm = b.norm_l2();
    let mut residual_norms = Vec::new();
    if config.record_residuals {
        residual_norms.push(b_norm);
    }

    if b_norm == 0.0 || num_shifts == 0 {
        return Ok(ShiftedSolveOutput {
            solution: Mat::zeros(n, 1),
            stats: SolveStats {
                iterations: 0,
                residual_norms,
                final_residual_norm: b_norm,
                termination: Termination::Converged,
            },
        });
    }

    // The family is solved for A + sign·σ_k.
    let sign = if negate { -1.0 } else { 1.0 };
    let one = c64::new(1.0, 0.0);
    let threshold = stopping_threshold(config, b_norm);

    let mut state = ShiftedState::new(b, num_shifts);
    let mut r = b.to_owned();
    let mut p = r.clone();
    let mut r_norm2 = b_norm * b_norm;
    let mut beta_old = 1.0;
    let mut alpha = 1.0;
    let mut iterations = 0;
    let mut termination = Termination::MaxIterations;

    while iterations < config.max_iterations {
        if is_cancelled(cancel) {
            termination = Termination::Cancelled;
            break;
        }

        let ap = operator.apply(p.as_ref());
        let p_ap = dot(p.as_ref(), ap.as_ref());
        if p_ap == 0.0 || !p_ap.is_finite() {
            termination = Termination::Breakdown;
            break;
        }
        let beta = -r_norm2 / p_ap;

        for k in 0..num_shifts {
            if !state.active[k] {
                continue;
            }
            let sigma = shifts[k] * sign;
            let zeta_old = state.zeta_old[k];
            let zeta_cur = state.zeta_cur[k];
            let denominator =
                (zeta_old - zeta_cur) * (beta * alpha) + zeta_old * beta_old * (one - sigma * beta);
            let zeta_new = zeta_cur * zeta_old * beta_old / denominator;
            if !(zeta_new.re.is_finite() && zeta_new.im.is_finite()) {
                log::warn!("CG-M recurrence for shift {k} became singular; freezing it.");
                state.active[k] = false;
                continue;
            }
            let beta_sh = zeta_new * beta / zeta_cur;

            zip!(state.x[k].as_mut(), state.p[k].as_ref())
                .for_each(|unzip!(x, p)| *x -= beta_sh * *p);
            state.zeta_new[k] = zeta_new;
            state.beta[k] = beta_sh;
        }

        axpy(&mut r, beta, ap.as_ref());
        let r_norm2_new = dot(r.as_ref(), r.as_ref());
        iterations += 1;
        if config.record_residuals {
            residual_norms.push(r_norm2_new.sqrt());
        }

        if r_norm2_new == 0.0 || r_norm2_new.sqrt() <= threshold {
            r_norm2 = r_norm2_new;
            termination = Termination::Converged;
            break;
        }

        alpha = r_norm2_new / r_norm2;
        r_norm2 = r_norm2_new;
        update_direction(&mut p, alpha, r.as_ref());

        let r_norm = r_norm2.sqrt();
        for k in 0..num_shifts {
            if !state.active[k] {
                continue;
            }
            let zeta_new = state.zeta_new[k];
            if zeta_new.norm() * r_norm <= threshold {
                state.active[k] = false;
                continue;
            }
            let zeta_cur = state.zeta_cur[k];
            let alpha_sh = zeta_new * state.beta[k] * alpha / (zeta_cur * beta);

            zip!(state.p[k].as_mut(), r.as_ref())
                .for_each(|unzip!(p, r)| *p = alpha_sh * *p + zeta_new * *r);

            state.zeta_old[k] = zeta_cur;
            state.zeta_cur[k] = zeta_new;
        }
        beta_old = beta;
    }

    let mut solution = Mat::<c64>::zeros(n, 1);
    for (weight, x_k) in weights.iter().zip(state.x.iter()) {
        zip!(solution.as_mut(), x_k.as_ref()).for_each(|unzip!(y, x)| *y += *weight * *x);
    }

    let stats = SolveStats {
        iterations,
        residual_norms,
        final_residual_norm: r_norm2.sqrt(),
        termination,
    };
    report(&stats, "CG-M");
    Ok(ShiftedSolveOutput { solution, stats })
}
