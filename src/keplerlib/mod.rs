//! Two-body propagation in universal variables
//!
//! Advances a Cartesian state through the exact two-body flow about the
//! chosen central body. Kepler's equation is written in the universal
//! anomaly x with Stumpff/Goodyear G-functions, so a single formulation
//! covers elliptic, parabolic and hyperbolic motion; the branch is picked
//! from the sign of the energy-like parameter β = 2μ/r₀ − v².
//!
//! The root of the universal Kepler equation
//!
//!   r₀·x + η·G₂(β,x) + ζ·G₃(β,x) = dt
//!
//! is found by Newton iteration, falling back to a fifth-order Laguerre
//! iterate and finally to bisection. When every iterate family fails (or a
//! hyperbolic argument overflows), the step is split into four equal
//! sub-steps and retried recursively, to a bounded depth.

use nalgebra::{Vector3, Vector6};

use crate::ephemeris::Body;
use crate::errors::{Error, Result};

/// Relative tolerance of the Newton iterate
const NEWTON_TOL: f64 = 1e-8;
/// Newton iteration limit
const NEWTON_MAX_ITER: usize = 10;
/// Relative tolerance of the Laguerre iterate
const LAGUERRE_TOL: f64 = 1e-9;
/// Laguerre iteration limit
const LAGUERRE_MAX_ITER: usize = 20;
/// Bisection iteration limit
const BISECTION_MAX_ITER: usize = 200;
/// Hyperbolic half-argument overflow guard for the Newton iterate
const NEWTON_ARG_LIMIT: f64 = 200.0;
/// Hyperbolic half-argument overflow guard for the Laguerre iterate
const LAGUERRE_ARG_LIMIT: f64 = 50.0;
/// Maximum depth of the four-way step-splitting recursion
const MAX_SPLIT_DEPTH: usize = 30;

/// Conic branch selected from the sign of β
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitClass {
    /// β > 0, bound orbit
    Elliptic,
    /// β = 0 exactly
    Parabolic,
    /// β < 0, unbound orbit
    Hyperbolic,
}

/// Scalar invariants of the two-body geometry at the step's start
#[derive(Debug, Clone, Copy)]
struct TwoBodyGeometry {
    /// Initial radius |r₀|
    r0: f64,
    /// η = r·v
    eta: f64,
    /// β = 2μ/r₀ − v²
    beta: f64,
    /// ζ = μ − β·r₀
    zeta: f64,
    /// b = √|β|
    b: f64,
    class: OrbitClass,
}

impl TwoBodyGeometry {
    fn new(mu: f64, r_vec: &Vector3<f64>, v_vec: &Vector3<f64>) -> Self {
        let r0 = r_vec.norm();
        let v2 = v_vec.dot(v_vec);
        let eta = r_vec.dot(v_vec);
        let beta = 2.0 * mu / r0 - v2;
        let zeta = mu - beta * r0;
        let class = if beta > 0.0 {
            OrbitClass::Elliptic
        } else if beta < 0.0 {
            OrbitClass::Hyperbolic
        } else {
            OrbitClass::Parabolic
        };
        TwoBodyGeometry {
            r0,
            eta,
            beta,
            zeta,
            b: beta.abs().sqrt(),
            class,
        }
    }
}

/// G-functions G₁, G₂, G₃ of (β, x) for one branch
#[derive(Debug, Clone, Copy)]
struct GFunctions {
    g1: f64,
    g2: f64,
    g3: f64,
}

impl GFunctions {
    fn eval(geom: &TwoBodyGeometry, x: f64) -> Self {
        match geom.class {
            OrbitClass::Elliptic => {
                let s = 0.5 * geom.b * x;
                let (sin_s, cos_s) = s.sin_cos();
                let g1 = 2.0 * sin_s * cos_s / geom.b;
                let g2 = 2.0 * sin_s * sin_s / geom.beta;
                GFunctions {
                    g1,
                    g2,
                    g3: (x - g1) / geom.beta,
                }
            }
            OrbitClass::Parabolic => GFunctions {
                g1: x,
                g2: x * x / 2.0,
                g3: x * x * x / 6.0,
            },
            OrbitClass::Hyperbolic => {
                let s = 0.5 * geom.b * x;
                let sinh_s = s.sinh();
                let cosh_s = s.cosh();
                let g1 = 2.0 * sinh_s * cosh_s / geom.b;
                let g2 = -2.0 * sinh_s * sinh_s / geom.beta;
                GFunctions {
                    g1,
                    g2,
                    g3: (x - g1) / geom.beta,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Root finding for the universal Kepler equation
// ---------------------------------------------------------------------------

/// Universal Kepler function f(x) = r₀x + ηG₂ + ζG₃ − dt and its first two
/// derivatives; f′(x) equals the radius at anomaly x
fn kepler_function(geom: &TwoBodyGeometry, dt: f64, x: f64) -> (f64, f64, f64) {
    let g = GFunctions::eval(geom, x);
    let f = geom.r0 * x + geom.eta * g.g2 + geom.zeta * g.g3 - dt;
    let fp = geom.r0 + geom.eta * g.g1 + geom.zeta * g.g2;
    let g0 = 1.0 - geom.beta * g.g2;
    let fpp = geom.eta * g0 + geom.zeta * g.g1;
    (f, fp, fpp)
}

/// Guard against sinh/cosh overflow in the hyperbolic branch
fn check_argument(geom: &TwoBodyGeometry, x: f64, limit: f64) -> Result<()> {
    if geom.class == OrbitClass::Hyperbolic {
        let arg = (0.5 * geom.b * x).abs();
        if arg > limit {
            return Err(Error::HyperbolicOverflow { arg, limit });
        }
    }
    Ok(())
}

fn newton_iterate(geom: &TwoBodyGeometry, dt: f64, x0: f64) -> Result<f64> {
    let mut x = x0;
    for _ in 0..NEWTON_MAX_ITER {
        check_argument(geom, x, NEWTON_ARG_LIMIT)?;
        let (f, fp, _) = kepler_function(geom, dt, x);
        if fp == 0.0 {
            break;
        }
        let dx = f / fp;
        x -= dx;
        if dx.abs() <= NEWTON_TOL * x.abs() {
            return Ok(x);
        }
    }
    Err(Error::NonConvergence {
        component: "kepler/newton",
        detail: format!("no root near x = {x}"),
    })
}

/// Laguerre iterate with fifth-order convergence,
/// Δx = −5f / (f′ + sign(f′)·√|16f′² − 20ff″|)
fn laguerre_iterate(geom: &TwoBodyGeometry, dt: f64, x0: f64) -> Result<f64> {
    let mut x = x0;
    for _ in 0..LAGUERRE_MAX_ITER {
        check_argument(geom, x, LAGUERRE_ARG_LIMIT)?;
        let (f, fp, fpp) = kepler_function(geom, dt, x);
        let disc = (16.0 * fp * fp - 20.0 * f * fpp).abs().sqrt();
        let denom = fp + fp.signum() * disc;
        if denom == 0.0 {
            break;
        }
        let dx = 5.0 * f / denom;
        x -= dx;
        if dx.abs() <= LAGUERRE_TOL * x.abs() {
            return Ok(x);
        }
    }
    Err(Error::NonConvergence {
        component: "kepler/laguerre",
        detail: format!("no root near x = {x}"),
    })
}

fn bisection_iterate(geom: &TwoBodyGeometry, mu: f64, dt: f64, x0: f64) -> Result<f64> {
    // Bracket the root; f is monotone non-decreasing since f′ = r ≥ 0
    let (mut lo, mut hi) = match geom.class {
        OrbitClass::Elliptic => {
            // One revolution advances x by 2π/b and t by the period
            let x_period = 2.0 * std::f64::consts::PI / geom.b;
            let period = 2.0 * std::f64::consts::PI * mu / (geom.b * geom.b * geom.b);
            let n = (dt / period).floor();
            (n * x_period, (n + 1.0) * x_period)
        }
        _ => {
            let (a, b) = (0.5 * x0, 10.0 * x0);
            if a <= b {
                (a, b)
            } else {
                (b, a)
            }
        }
    };

    check_argument(geom, lo, NEWTON_ARG_LIMIT)?;
    check_argument(geom, hi, NEWTON_ARG_LIMIT)?;
    let (f_lo, _, _) = kepler_function(geom, dt, lo);
    let (f_hi, _, _) = kepler_function(geom, dt, hi);
    if f_lo * f_hi > 0.0 {
        return Err(Error::NonConvergence {
            component: "kepler/bisection",
            detail: format!("root not bracketed in ({lo}, {hi})"),
        });
    }

    let mut x = 0.5 * (lo + hi);
    for _ in 0..BISECTION_MAX_ITER {
        let (f, _, _) = kepler_function(geom, dt, x);
        if f == 0.0 {
            return Ok(x);
        }
        if f * f_lo > 0.0 {
            lo = x;
        } else {
            hi = x;
        }
        let next = 0.5 * (lo + hi);
        if (hi - lo).abs() <= LAGUERRE_TOL * next.abs() {
            return Ok(next);
        }
        x = next;
    }
    Ok(x)
}

/// Seed the universal anomaly for one branch
fn seed(geom: &TwoBodyGeometry, dt: f64) -> f64 {
    let linear = dt / geom.r0;
    match geom.class {
        OrbitClass::Elliptic => {
            // One Newton step on the cubic predictor
            // ζx³ + 3ηx² + 6r₀x − 6dt = 0
            let c = geom.zeta * linear.powi(3) + 3.0 * geom.eta * linear * linear
                + 6.0 * geom.r0 * linear
                - 6.0 * dt;
            let cp = 3.0 * geom.zeta * linear * linear + 6.0 * geom.eta * linear + 6.0 * geom.r0;
            if cp != 0.0 {
                linear - c / cp
            } else {
                linear
            }
        }
        OrbitClass::Hyperbolic => {
            if geom.zeta != 0.0 {
                cubic_real_root(geom.zeta, 3.0 * geom.eta, 6.0 * geom.r0, -6.0 * dt)
            } else if geom.eta != 0.0 {
                let disc = geom.r0 * geom.r0 + 2.0 * geom.eta * dt;
                if disc >= 0.0 {
                    (-geom.r0 + disc.sqrt()) / geom.eta
                } else {
                    linear
                }
            } else {
                linear
            }
        }
        OrbitClass::Parabolic => linear,
    }
}

/// Solve the universal Kepler equation for x
fn solve_universal(geom: &TwoBodyGeometry, mu: f64, dt: f64) -> Result<f64> {
    if geom.class == OrbitClass::Parabolic {
        // The universal equation is exactly the cubic; no iteration needed
        return Ok(cubic_real_root(
            geom.zeta,
            3.0 * geom.eta,
            6.0 * geom.r0,
            -6.0 * dt,
        ));
    }

    let x0 = seed(geom, dt);
    newton_iterate(geom, dt, x0)
        .or_else(|_| laguerre_iterate(geom, dt, x0))
        .or_else(|_| bisection_iterate(geom, mu, dt, x0))
}

/// Single real root of ax³ + bx² + cx + d = 0 by Cardano's method
///
/// In the three-real-roots regime the smallest positive root is returned
/// (or the smallest root when none is positive).
pub(crate) fn cubic_real_root(a: f64, b: f64, c: f64, d: f64) -> f64 {
    // Depressed cubic t³ + pt + q via x = t − b/(3a)
    let shift = b / (3.0 * a);
    let p = (3.0 * a * c - b * b) / (3.0 * a * a);
    let q = (2.0 * b * b * b - 9.0 * a * b * c + 27.0 * a * a * d) / (27.0 * a * a * a);
    let disc = 0.25 * q * q + p * p * p / 27.0;

    if disc >= 0.0 {
        let root = disc.sqrt();
        let t = (-0.5 * q + root).cbrt() + (-0.5 * q - root).cbrt();
        t - shift
    } else {
        // Three real roots (trigonometric form)
        let m = 2.0 * (-p / 3.0).sqrt();
        let theta = (3.0 * q / (p * m)).acos() / 3.0;
        let mut best = f64::INFINITY;
        let mut smallest = f64::INFINITY;
        for k in 0..3 {
            let t = m * (theta - 2.0 * std::f64::consts::PI * k as f64 / 3.0).cos();
            let x = t - shift;
            smallest = smallest.min(x);
            if x > 0.0 && x < best {
                best = x;
            }
        }
        if best.is_finite() {
            best
        } else {
            smallest
        }
    }
}

// ---------------------------------------------------------------------------
// State propagation
// ---------------------------------------------------------------------------

/// One exact two-body step without the splitting wrapper
fn two_body_step(mu: f64, dt: f64, state: &Vector6<f64>) -> Result<Vector6<f64>> {
    let r_vec = state.fixed_rows::<3>(0).into_owned();
    let v_vec = state.fixed_rows::<3>(3).into_owned();
    let geom = TwoBodyGeometry::new(mu, &r_vec, &v_vec);

    let x = solve_universal(&geom, mu, dt)?;
    let g = GFunctions::eval(&geom, x);
    let r = geom.r0 + geom.eta * g.g1 + geom.zeta * g.g2;

    // Lagrange coefficients, written as increments on the identity map
    let fhat = -mu * g.g2 / geom.r0;
    let gfun = geom.eta * g.g2 + geom.r0 * g.g1;
    let fdot = -mu * g.g1 / (r * geom.r0);
    let ghat = -mu * g.g2 / r;

    let new_r = r_vec + fhat * r_vec + gfun * v_vec;
    let new_v = v_vec + fdot * r_vec + ghat * v_vec;
    if !new_r.iter().chain(new_v.iter()).all(|c| c.is_finite()) {
        return Err(Error::NonFiniteState { t: dt });
    }

    let mut out = Vector6::zeros();
    out.fixed_rows_mut::<3>(0).copy_from(&new_r);
    out.fixed_rows_mut::<3>(3).copy_from(&new_v);
    Ok(out)
}

fn propagate_split(mu: f64, dt: f64, state: Vector6<f64>, depth: usize) -> Result<Vector6<f64>> {
    if dt == 0.0 {
        return Ok(state);
    }
    match two_body_step(mu, dt, &state) {
        Ok(out) => Ok(out),
        Err(_) if depth < MAX_SPLIT_DEPTH => {
            // Retry as four quarter-steps; the geometry scalars are
            // recomputed from each intermediate state
            let quarter = 0.25 * dt;
            let mut s = state;
            for _ in 0..4 {
                s = propagate_split(mu, quarter, s, depth + 1)?;
            }
            Ok(s)
        }
        Err(_) => Err(Error::NonConvergence {
            component: "kepler",
            detail: format!("splitting depth {MAX_SPLIT_DEPTH} exhausted at dt = {dt}"),
        }),
    }
}

/// Advance one body through the two-body flow of `central_body` for `dt`
/// days
///
/// The state is relative to the central body, position in AU and velocity
/// in AU/day. Failed steps are split into four sub-steps and retried
/// recursively before the call gives up.
pub fn kepler_step(central_body: Body, dt: f64, state: &Vector6<f64>) -> Result<Vector6<f64>> {
    propagate_split(central_body.mu(), dt, *state, 0)
}

// ---------------------------------------------------------------------------
// Two-body invariants
// ---------------------------------------------------------------------------

/// Specific orbital energy v²/2 − μ/r of a state, AU²/day²
pub fn specific_energy(state: &Vector6<f64>, mu: f64) -> f64 {
    let r = state.fixed_rows::<3>(0).norm();
    let v2 = state.fixed_rows::<3>(3).norm_squared();
    0.5 * v2 - mu / r
}

/// Specific angular momentum r × v of a state, AU²/day
pub fn specific_angular_momentum(state: &Vector6<f64>) -> Vector3<f64> {
    let r_vec = state.fixed_rows::<3>(0).into_owned();
    let v_vec = state.fixed_rows::<3>(3).into_owned();
    r_vec.cross(&v_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{GAUSS_GM, GAUSS_K};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn state(px: f64, py: f64, pz: f64, vx: f64, vy: f64, vz: f64) -> Vector6<f64> {
        Vector6::new(px, py, pz, vx, vy, vz)
    }

    #[test]
    fn test_cubic_single_real_root() {
        // x³ − x² + x − 1 = (x² + 1)(x − 1)
        let x = cubic_real_root(1.0, -1.0, 1.0, -1.0);
        assert_relative_eq!(x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cubic_three_real_roots_smallest_positive() {
        // (x − 1)(x − 2)(x + 3) = x³ − 7x + 6
        let x = cubic_real_root(1.0, 0.0, -7.0, 6.0);
        assert_relative_eq!(x, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_circular_orbit_full_period() {
        // Earth-like circular orbit; one period must close to 1e-12
        let s0 = state(1.0, 0.0, 0.0, 0.0, GAUSS_K, 0.0);
        let period = 2.0 * PI / GAUSS_K;
        let s1 = kepler_step(Body::Sun, period, &s0).unwrap();
        for k in 0..6 {
            assert_relative_eq!(s1[k], s0[k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_circular_orbit_half_period() {
        let s0 = state(1.0, 0.0, 0.0, 0.0, GAUSS_K, 0.0);
        let period = 2.0 * PI / GAUSS_K;
        let s1 = kepler_step(Body::Sun, 0.5 * period, &s0).unwrap();
        assert_relative_eq!(s1[0], -1.0, epsilon = 1e-11);
        assert_relative_eq!(s1[1], 0.0, epsilon = 1e-11);
        assert_relative_eq!(s1[4], -GAUSS_K, epsilon = 1e-11);
    }

    #[test]
    fn test_eccentric_orbit_closes() {
        // e = 0.7 orbit starting at periapsis
        let e: f64 = 0.7;
        let a = 1.0;
        let rp = a * (1.0 - e);
        let vp = (GAUSS_GM * (2.0 / rp - 1.0 / a)).sqrt();
        let s0 = state(rp, 0.0, 0.0, 0.0, vp, 0.0);
        let period = 2.0 * PI * (a * a * a / GAUSS_GM).sqrt();

        let s1 = kepler_step(Body::Sun, period, &s0).unwrap();
        for k in 0..6 {
            assert_relative_eq!(s1[k], s0[k], epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_hyperbolic_flyby_energy() {
        // Hyperbolic departure; energy must be preserved to 1e-11
        let s0 = state(5.0, 0.0, 0.0, 0.0, 0.03, 0.0);
        let e0 = specific_energy(&s0, GAUSS_GM);
        assert!(e0 > 0.0);

        let s1 = kepler_step(Body::Sun, 100.0, &s0).unwrap();
        let r1 = s1.fixed_rows::<3>(0).norm();
        assert!(r1 > 5.0, "outbound branch must recede, r = {r1}");

        let e1 = specific_energy(&s1, GAUSS_GM);
        assert_relative_eq!(e1, e0, max_relative = 1e-11);
    }

    #[test]
    fn test_parabolic_branch() {
        // Force β = 0 exactly: search nearby representable speeds for one
        // whose square is exactly 2μ/r₀
        let mu = GAUSS_GM;
        let target = 2.0 * mu;
        let vy0 = target.sqrt();
        let bits = vy0.to_bits() as i64;
        let vy = (-3..=3)
            .map(|k| f64::from_bits((bits + k) as u64))
            .find(|v| v * v == target)
            .expect("no representable parabolic speed");

        let s0 = state(1.0, 0.0, 0.0, 0.0, vy, 0.0);
        let dt = 40.0;
        let s1 = kepler_step(Body::Sun, dt, &s0).unwrap();

        // The universal equation reduces to the cubic μx³/6 + r₀x = dt,
        // and the analytic parabola gives r = r₀ + μx²/2
        let x = cubic_real_root(mu, 0.0, 6.0, -6.0 * dt);
        let r_expected = 1.0 + 0.5 * mu * x * x;
        let r1 = s1.fixed_rows::<3>(0).norm();
        assert_relative_eq!(r1, r_expected, max_relative = 1e-10);

        // Parabolic energy stays at zero within rounding
        let e1 = specific_energy(&s1, mu);
        assert!(e1.abs() < 1e-10, "parabolic energy drifted to {e1}");
    }

    #[test]
    fn test_backward_step_inverts_forward() {
        let s0 = state(0.5, 0.3, 0.1, -0.01, 0.02, 0.005);
        let s1 = kepler_step(Body::Sun, 37.5, &s0).unwrap();
        let s2 = kepler_step(Body::Sun, -37.5, &s1).unwrap();
        for k in 0..6 {
            assert_relative_eq!(s2[k], s0[k], epsilon = 1e-11, max_relative = 1e-11);
        }
    }

    #[test]
    fn test_angular_momentum_conserved() {
        let s0 = state(1.2, -0.3, 0.2, 0.001, 0.015, -0.002);
        let l0 = specific_angular_momentum(&s0);
        let s1 = kepler_step(Body::Sun, 250.0, &s0).unwrap();
        let l1 = specific_angular_momentum(&s1);
        for k in 0..3 {
            assert_relative_eq!(l1[k], l0[k], epsilon = 1e-13, max_relative = 1e-11);
        }
    }

    #[test]
    fn test_zero_dt_is_identity() {
        let s0 = state(1.0, 2.0, 3.0, 0.01, 0.02, 0.03);
        let s1 = kepler_step(Body::Sun, 0.0, &s0).unwrap();
        assert_eq!(s0, s1);
    }

    #[test]
    fn test_high_eccentricity_long_arc() {
        // e = 0.95: the stressed regime that exercises the fallback
        // iterates; the orbit must still close over a full period
        let e: f64 = 0.95;
        let a = 2.5;
        let rp = a * (1.0 - e);
        let vp = (GAUSS_GM * (2.0 / rp - 1.0 / a)).sqrt();
        let s0 = state(rp, 0.0, 0.0, 0.0, vp, 0.0);
        let period = 2.0 * PI * (a * a * a / GAUSS_GM).sqrt();

        let s1 = kepler_step(Body::Sun, period, &s0).unwrap();
        let rel = (s1 - s0).norm() / s0.norm();
        assert!(rel < 1e-7, "orbit failed to close, rel = {rel}");
    }
}
