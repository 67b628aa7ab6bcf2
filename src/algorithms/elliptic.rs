//! Complete elliptic integrals and Jacobi elliptic functions.
//!
//! The contour quadrature for `log(A)` maps an annulus conformally onto the doubly
//! connected region between the spectrum and the branch cut. That map is built from
//! `sn`, `cn` and `dn` evaluated at complex points, with the quarter periods `K(m)` and
//! `K'(m) = K(1 - m)`.
//!
//! All functions take the *parameter* `m = k²`, not the modulus `k`.

use faer::c64;

/// Upper bound on arithmetic-geometric mean steps; convergence is quadratic.
const MAX_AGM_STEPS: usize = 32;

/// Below this distance from 0 or 1 the parameter is treated as degenerate.
const DEGENERATE_PARAMETER: f64 = 1e-15;

/// Computes the complete elliptic integral of the first kind `K(m)`, `0 ≤ m < 1`,
/// through the arithmetic-geometric mean `K(m) = π / (2 AGM(1, √(1-m)))`.
pub fn complete_elliptic_k(m: f64) -> f64 {
    debug_assert!((0.0..1.0).contains(&m), "parameter must lie in [0, 1)");
    let mut a = 1.0f64;
    let mut b = (1.0 - m).sqrt();
    for _ in 0..MAX_AGM_STEPS {
        if (a - b).abs() <= f64::EPSILON * a {
            break;
        }
        let next_a = 0.5 * (a + b);
        b = (a * b).sqrt();
        a = next_a;
    }
    std::f64::consts::PI / (2.0 * a)
}

/// Evaluates `(sn(u|m), cn(u|m), dn(u|m))` for real `u`, `0 ≤ m ≤ 1`, by the descending
/// Landen (AGM) scheme.
pub fn jacobi_elliptic_real(u: f64, m: f64) -> (f64, f64, f64) {
    if m < DEGENERATE_PARAMETER {
        return (u.sin(), u.cos(), 1.0);
    }
    if m > 1.0 - DEGENERATE_PARAMETER {
        let sech = 1.0 / u.cosh();
        return (u.tanh(), sech, sech);
    }

    let mut a = [0.0f64; MAX_AGM_STEPS + 1];
    let mut c = [0.0f64; MAX_AGM_STEPS + 1];
    a[0] = 1.0;
    c[0] = m.sqrt();
    let mut b = (1.0 - m).sqrt();
    let mut n = 0;
    while c[n].abs() > f64::EPSILON && n < MAX_AGM_STEPS {
        a[n + 1] = 0.5 * (a[n] + b);
        c[n + 1] = 0.5 * (a[n] - b);
        b = (a[n] * b).sqrt();
        n += 1;
    }

    let mut phi = 2.0f64.powi(n as i32) * a[n] * u;
    for i in (1..=n).rev() {
        phi = 0.5 * (phi + (c[i] * phi.sin() / a[i]).asin());
    }

    let sn = phi.sin();
    let cn = phi.cos();
    let dn = (1.0 - m * sn * sn).sqrt();
    (sn, cn, dn)
}

/// Evaluates `(sn(z|m), cn(z|m), dn(z|m))` for complex `z = x + iy` and real `m ∈ [0, 1]`.
///
/// Uses the addition theorem together with Jacobi's imaginary transformation, so only
/// real evaluations at `(x | m)` and `(y | 1 - m)` are needed.
pub fn jacobi_elliptic(z: c64, m: f64) -> (c64, c64, c64) {
    let (s, c, d) = jacobi_elliptic_real(z.re, m);
    let (s1, c1, d1) = jacobi_elliptic_real(z.im, 1.0 - m);
    let denominator = c1 * c1 + m * s * s * s1 * s1;

    let sn = c64::new(s * d1, c * d * s1 * c1) / denominator;
    let cn = c64::new(c * c1, -s * d * s1 * d1) / denominator;
    let dn = c64::new(d * c1 * d1, -m * s * c * s1) / denominator;
    (sn, cn, dn)
}
