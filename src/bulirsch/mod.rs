//! Bulirsch-Stoer extrapolation integrator
//!
//! One Bulirsch-Stoer step runs the modified-midpoint stepper over the
//! doubling substep sequence, feeds each result into the extrapolation
//! table, and stops as soon as every particle's diagonal has converged.
//! Each particle's output is read from the column at which it first
//! converged; a particle that exhausts the sequence is returned from the
//! last column and flagged, which is not an error here.
//!
//! States and, when carried, the 6×6 state-transition matrices are
//! flattened into one component slab per particle (matrix entries in
//! row-major order) so both share the extrapolation machinery.

pub mod extrapolate;
pub mod midpoint;

use nalgebra::{Matrix6, Vector6};

use crate::constants::BS_SEQUENCE;
use crate::encounters::EncounterLog;
use crate::ephemeris::Ephemeris;
use crate::errors::Result;
use crate::forces::ForceModel;

pub use extrapolate::{ExtrapolationMethod, ExtrapolationTable};
pub use midpoint::{midpoint_step, MidpointResult};

/// Diagnostics of one Bulirsch-Stoer step
#[derive(Debug, Clone)]
pub struct StepInfo {
    /// Midpoint rows evaluated before the step finished
    pub rows_used: usize,
    /// Particles whose extrapolation diagonal never converged
    pub unconverged: Vec<usize>,
}

/// Components per particle in the flattened slab
fn slab_width(with_jacobians: bool) -> usize {
    if with_jacobians {
        42
    } else {
        6
    }
}

/// Flatten states (and matrices, row-major) into the component slab
fn flatten(
    states: &[Vector6<f64>],
    jacobians: Option<&[Matrix6<f64>]>,
    buf: &mut Vec<f64>,
) {
    buf.clear();
    for (i, state) in states.iter().enumerate() {
        buf.extend(state.iter());
        if let Some(jacs) = jacobians {
            let m = &jacs[i];
            for row in 0..6 {
                for col in 0..6 {
                    buf.push(m[(row, col)]);
                }
            }
        }
    }
}

/// Rebuild one particle's state (and matrix) from its slab range
fn unflatten(slab: &[f64]) -> (Vector6<f64>, Option<Matrix6<f64>>) {
    let state = Vector6::from_row_slice(&slab[..6]);
    let jac = if slab.len() >= 42 {
        let mut m = Matrix6::zeros();
        for row in 0..6 {
            for col in 0..6 {
                m[(row, col)] = slab[6 + row * 6 + col];
            }
        }
        Some(m)
    } else {
        None
    };
    (state, jac)
}

/// One extrapolated step of size `h` starting at epoch `t`
///
/// `states` (and `jacobians`, when given) are updated in place with the
/// per-particle first-converged-column extrapolates.
pub fn bulirsch_step<E: Ephemeris>(
    force: &ForceModel<'_, E>,
    t: f64,
    h: f64,
    states: &mut [Vector6<f64>],
    mut jacobians: Option<&mut [Matrix6<f64>]>,
    mut encounters: Option<&mut EncounterLog>,
    method: ExtrapolationMethod,
) -> Result<StepInfo> {
    let n = states.len();
    let with_jac = jacobians.is_some();

    // The initial conditions are re-used by every midpoint row
    let s0: Vec<Vector6<f64>> = states.to_vec();
    let j0: Option<Vec<Matrix6<f64>>> = jacobians.as_ref().map(|j| j.to_vec());

    let mut table = ExtrapolationTable::new(method, n, slab_width(with_jac));
    let mut slab = Vec::with_capacity(n * slab_width(with_jac));

    for &nsub in BS_SEQUENCE.iter() {
        let result = midpoint_step(
            force,
            t,
            h,
            nsub,
            &s0,
            j0.as_deref(),
            encounters.as_deref_mut(),
        )?;
        flatten(&result.states, result.jacobians.as_deref(), &mut slab);
        table.add_row(h / nsub as f64, &slab);
        if table.all_converged() {
            break;
        }
    }

    let mut unconverged = Vec::new();
    for p in 0..n {
        if table.converged_row(p).is_none() {
            unconverged.push(p);
        }
        let (state, jac) = unflatten(table.output(p));
        states[p] = state;
        if let (Some(out), Some(m)) = (jacobians.as_deref_mut(), jac) {
            out[p] = m;
        }
    }

    Ok(StepInfo {
        rows_used: table.rows(),
        unconverged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{GAUSS_GM, GAUSS_K, NUM_PERTURBERS};
    use crate::ephemeris::{Body, NoEphemeris};
    use crate::keplerlib::kepler_step;
    use approx::assert_relative_eq;

    fn two_body_force(eph: &NoEphemeris) -> ForceModel<'_, NoEphemeris> {
        let mut force = ForceModel::new(eph);
        force.planet_mask = [false; NUM_PERTURBERS];
        force.relativity = false;
        force
    }

    #[test]
    fn test_step_matches_kepler() {
        let eph = NoEphemeris;
        let force = two_body_force(&eph);
        let s0 = Vector6::new(1.0, 0.0, 0.0, 0.0, GAUSS_K, 0.0);
        let mut states = [s0];

        let info = bulirsch_step(
            &force,
            0.0,
            10.0,
            &mut states,
            None,
            None,
            ExtrapolationMethod::Polynomial,
        )
        .unwrap();

        assert!(info.unconverged.is_empty());
        let exact = kepler_step(Body::Sun, 10.0, &s0).unwrap();
        for k in 0..6 {
            assert_relative_eq!(states[0][k], exact[k], epsilon = 1e-13, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_rational_variant_agrees_with_polynomial() {
        let eph = NoEphemeris;
        let force = two_body_force(&eph);
        let s0 = Vector6::new(0.8, 0.2, 0.05, -0.004, 0.019, 0.001);

        let mut poly = [s0];
        let mut rat = [s0];
        bulirsch_step(&force, 0.0, 5.0, &mut poly, None, None, ExtrapolationMethod::Polynomial)
            .unwrap();
        bulirsch_step(&force, 0.0, 5.0, &mut rat, None, None, ExtrapolationMethod::Rational)
            .unwrap();
        for k in 0..6 {
            assert_relative_eq!(poly[0][k], rat[0][k], epsilon = 1e-12, max_relative = 1e-11);
        }
    }

    #[test]
    fn test_jacobian_extrapolates_with_state() {
        let eph = NoEphemeris;
        let force = two_body_force(&eph);
        let s0 = Vector6::new(1.0, 0.0, 0.0, 0.0, GAUSS_K, 0.0);

        let mut states = [s0];
        let mut jacs = [Matrix6::identity()];
        bulirsch_step(
            &force,
            0.0,
            20.0,
            &mut states,
            Some(&mut jacs[..]),
            None,
            ExtrapolationMethod::Polynomial,
        )
        .unwrap();

        // Compare columns against centered differences of the propagated state
        let delta = 1e-6;
        for col in 0..6 {
            let mut plus = s0;
            plus[col] += delta;
            let mut minus = s0;
            minus[col] -= delta;
            let mut sp = [plus];
            let mut sm = [minus];
            bulirsch_step(&force, 0.0, 20.0, &mut sp, None, None, ExtrapolationMethod::Polynomial)
                .unwrap();
            bulirsch_step(&force, 0.0, 20.0, &mut sm, None, None, ExtrapolationMethod::Polynomial)
                .unwrap();
            for row in 0..6 {
                let numeric = (sp[0][row] - sm[0][row]) / (2.0 * delta);
                assert_relative_eq!(
                    jacs[0][(row, col)],
                    numeric,
                    epsilon = 1e-5,
                    max_relative = 1e-5
                );
            }
        }
    }

    #[test]
    fn test_backward_step_round_trip() {
        let eph = NoEphemeris;
        let force = two_body_force(&eph);
        let s0 = Vector6::new(1.0, 0.0, 0.0, 0.0, GAUSS_K, 0.0);

        let mut states = [s0];
        bulirsch_step(&force, 0.0, 15.0, &mut states, None, None, ExtrapolationMethod::Polynomial)
            .unwrap();
        bulirsch_step(&force, 15.0, -15.0, &mut states, None, None, ExtrapolationMethod::Polynomial)
            .unwrap();
        for k in 0..6 {
            assert_relative_eq!(states[0][k], s0[k], epsilon = 1e-12);
        }
    }
}
