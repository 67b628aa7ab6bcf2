//! Rational approximation of `log` by contour quadrature.
//!
//! This is method 2 of Hale, Higham and Trefethen ("Computing A^α, log(A), and related
//! matrix functions by contour integrals", 2008). The Cauchy integral of `log(z)` over a
//! contour enclosing `[λ_min, λ_max]` is rewritten with `z = w²` and discretized with the
//! trapezoid rule after a conformal map built from Jacobi elliptic functions. The
//! result, for every `x` in the interval, is
//!
//! ```text
//! log(x) ≈ c · x · Im Σ_j g_j / (x - w_j²),    g_j = log(w_j²) · cn_j dn_j / (w_j (1/k - sn_j)²)
//! ```
//!
//! Using `x / (x + σ) = 1 - σ / (x + σ)` with `σ_j = -w_j²`, this becomes the form the
//! shifted solver consumes:
//!
//! ```text
//! log(x) ≈ c₀ + Re Σ_j ω_j / (x + σ_j),    ω_j = i c g_j σ_j,    c₀ = c · Im Σ_j g_j
//! ```
//!
//! The error decays like `exp(-2π² K / (log(λ_max/λ_min) + 6))` in the number of shifts
//! `K`. [`num_shifts_for_accuracy`] inverts that rate, padding both the exponent and the
//! prefactor so the requested accuracy holds on wide intervals too.

use crate::{
    algorithms::elliptic::{complete_elliptic_k, jacobi_elliptic},
    eigen::SpectralBounds,
    error::{LogDetError, LogDetErrorKind},
};
use faer::c64;
use std::f64::consts::PI;

/// Intervals narrower than this (relative) are widened before building the conformal map,
/// whose modulus vanishes for a single point.
const MIN_RELATIVE_WIDTH: f64 = 1e-6;

/// Shifts and weights approximating `log` on an interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftQuadrature {
    /// `σ_j`.
    pub shifts: Vec<c64>,
    /// `ω_j`.
    pub weights: Vec<c64>,
    /// `c₀`.
    pub constant_term: f64,
    /// The interval the quadrature was built for.
    pub bounds: SpectralBounds,
}

impl ShiftQuadrature {
    /// Builds the quadrature with exactly `num_shifts` nodes on `bounds`.
    pub fn with_num_shifts(
        bounds: SpectralBounds,
        num_shifts: usize,
    ) -> Result<Self, LogDetError> {
        if bounds.min <= 0.0 {
            return Err(LogDetErrorKind::NotPositiveDefinite {
                min_eigenvalue: bounds.min,
            }
            .into());
        }
        if num_shifts == 0 {
            return Err(LogDetErrorKind::InputError(
                "The quadrature needs at least one shift.".to_string(),
            )
            .into());
        }

        let lambda_min = bounds.min;
        let lambda_max = bounds.max.max(bounds.min * (1.0 + MIN_RELATIVE_WIDTH));

        let ratio_root = (lambda_max / lambda_min).powf(0.25);
        let k = (ratio_root - 1.0) / (ratio_root + 1.0);
        let m = k * k;
        let quarter_period = complete_elliptic_k(m);
        let quarter_period_prime = complete_elliptic_k(1.0 - m);
        let scale = (lambda_min * lambda_max).powf(0.25);
        let multiplier = 8.0 * quarter_period * scale / (k * PI * num_shifts as f64);

        let one = c64::new(1.0, 0.0);
        let inv_k = one / k;
        let mut shifts = Vec::with_capacity(num_shifts);
        let mut weights = Vec::with_capacity(num_shifts);
        let mut imaginary_sum = 0.0;

        for j in 0..num_shifts {
            let t = c64::new(
                -quarter_period + (j as f64 + 0.5) * 2.0 * quarter_period / num_shifts as f64,
                0.5 * quarter_period_prime,
            );
            let (sn, cn, dn) = jacobi_elliptic(t, m);
            let w = (inv_k + sn) / (inv_k - sn) * scale;
            let dzdt = cn * dn / ((inv_k - sn) * (inv_k - sn));
            let w2 = w * w;
            let g = w2.ln() * dzdt / w;

            let sigma = -w2;
            imaginary_sum += g.im;
            shifts.push(sigma);
            weights.push(c64::new(0.0, multiplier) * g * sigma);
        }

        Ok(Self {
            shifts,
            weights,
            constant_term: multiplier * imaginary_sum,
            bounds,
        })
    }

    pub fn num_shifts(&self) -> usize {
        self.shifts.len()
    }

    /// Evaluates the scalar approximation `c₀ + Re Σ_j ω_j / (x + σ_j)`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let sum: c64 = self
            .shifts
            .iter()
            .zip(self.weights.iter())
            .map(|(sigma, omega)| *omega / (*sigma + x))
            .sum();
        self.constant_term + sum.re
    }

    /// Rejects shifts that make `A + σI` singular for some `λ` in the bounds, i.e.
    /// numerically real shifts with `-σ ∈ [λ_min, λ_max]`.
    pub fn validate(&self) -> Result<(), LogDetError> {
        let width = self.bounds.max.abs().max(1.0);
        for (index, sigma) in self.shifts.iter().enumerate() {
            if !(sigma.re.is_finite() && sigma.im.is_finite()) {
                return Err(LogDetErrorKind::DegenerateShift { index }.into());
            }
            let on_real_axis = sigma.im.abs() <= f64::EPSILON * width;
            let inside = -sigma.re >= self.bounds.min && -sigma.re <= self.bounds.max;
            if on_real_axis && inside {
                return Err(LogDetErrorKind::DegenerateShift { index }.into());
            }
        }
        Ok(())
    }
}

/// Number of shifts needed to reach `accuracy` on `bounds`.
pub fn num_shifts_for_accuracy(bounds: SpectralBounds, accuracy: f64) -> usize {
    let condition = bounds.condition_number().max(1.0);
    let estimate = 1.5 * (condition.ln() + 6.0) * (2.0 - accuracy.ln()) / (2.0 * PI * PI);
    (estimate.ceil() as usize).max(1)
}

/// Builds the quadrature for `log` on `bounds` with the requested accuracy.
pub fn log_rational_quadrature(
    bounds: SpectralBounds,
    accuracy: f64,
) -> Result<ShiftQuadrature, LogDetError> {
    if !(accuracy > 0.0 && accuracy < 1.0) {
        return Err(LogDetErrorKind::InputError(format!(
            "The accuracy must lie in (0, 1), got {accuracy}."
        ))
        .into());
    }
    let num_shifts = num_shifts_for_accuracy(bounds, accuracy);
    let quadrature = ShiftQuadrature::with_num_shifts(bounds, num_shifts)?;
    quadrature.validate()?;
    log::debug!(
        "Log quadrature on [{:.6e}, {:.6e}] uses {num_shifts} shifts for accuracy {accuracy:e}.",
        bounds.min,
        bounds.max
    );
    Ok(quadrature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_error(quadrature: &ShiftQuadrature, points: usize) -> f64 {
        let (a, b) = (quadrature.bounds.min, quadrature.bounds.max);
        (0..=points)
            .map(|i| a * (b / a).powf(i as f64 / points as f64))
            .map(|x| (quadrature.evaluate(x) - x.ln()).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_error_decays_with_number_of_shifts() {
        let bounds = SpectralBounds::new(1.0, 4.0).unwrap();
        let errors: Vec<f64> = [4, 6, 8, 10]
            .iter()
            .map(|&n| max_error(&ShiftQuadrature::with_num_shifts(bounds, n).unwrap(), 200))
            .collect();
        assert!(errors[0] < 1e-3);
        assert!(errors[1] < 1e-6);
        assert!(errors[2] < 1e-8);
        assert!(errors[3] < 1e-11);
    }

    #[test]
    fn test_requested_accuracy_is_met() {
        for &(min, max) in &[(1.0, 4.0), (1e-2, 1e2), (0.5, 0.51), (1e-3, 1e3), (0.1, 50.0)] {
            for &accuracy in &[1e-2, 1e-3, 1e-5, 1e-8] {
                let bounds = SpectralBounds::new(min, max).unwrap();
                let quadrature = log_rational_quadrature(bounds, accuracy).unwrap();
                let error = max_error(&quadrature, 300);
                assert!(
                    error < accuracy,
                    "[{min}, {max}] with accuracy {accuracy}: error {error}"
                );
            }
        }
    }

    #[test]
    fn test_shift_count_from_accuracy() {
        let bounds = SpectralBounds::new(1.0, 4.0).unwrap();
        assert_eq!(num_shifts_for_accuracy(bounds, 1e-5), 8);
        let wide = SpectralBounds::new(1e-3, 1e3).unwrap();
        assert_eq!(num_shifts_for_accuracy(wide, 1e-5), 21);
    }

    #[test]
    fn test_degenerate_interval_is_widened() {
        let bounds = SpectralBounds::new(2.0, 2.0).unwrap();
        let quadrature = log_rational_quadrature(bounds, 1e-6).unwrap();
        assert!((quadrature.evaluate(2.0) - 2.0f64.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_shifts_stay_off_the_negated_spectrum() {
        let bounds = SpectralBounds::new(0.1, 50.0).unwrap();
        let quadrature = log_rational_quadrature(bounds, 1e-6).unwrap();
        assert!(quadrature.validate().is_ok());
        assert!(quadrature.shifts.iter().all(|s| s.im.abs() > 0.0));
        assert_eq!(quadrature.shifts.len(), quadrature.weights.len());
    }

    #[test]
    fn test_non_positive_bounds_are_rejected() {
        let bounds = SpectralBounds::new(-1.0, 3.0).unwrap();
        let err = log_rational_quadrature(bounds, 1e-5).unwrap_err();
        assert_eq!(
            err,
            LogDetError::from(LogDetErrorKind::NotPositiveDefinite {
                min_eigenvalue: -1.0
            })
        );
    }

    #[test]
    fn test_validate_flags_real_shift_inside_spectrum() {
        let quadrature = ShiftQuadrature {
            shifts: vec![c64::new(-2.0, 0.0)],
            weights: vec![c64::new(1.0, 0.0)],
            constant_term: 0.0,
            bounds: SpectralBounds::new(1.0, 4.0).unwrap(),
        };
        assert_eq!(
            quadrature.validate().unwrap_err(),
            LogDetError::from(LogDetErrorKind::DegenerateShift { index: 0 })
        );
    }
}
