//! Modified-midpoint base method
//!
//! One coarse step of size h is produced from n equal substeps:
//!
//!   q₀ = s_in
//!   q₁ = q₀ + dt·f(q₀, t)
//!   q_{k+1} = q_{k−1} + 2·dt·f(q_k, t + k·dt)
//!   s_out = ½·(q_n + q_{n−1} + dt·f(q_n, t + h))
//!
//! The same three-term recurrence advances the state-transition matrices,
//! with the right-hand side replaced by ∂f/∂s·P evaluated at the current
//! intermediate state. All particles share one substep schedule, so the
//! force model is evaluated exactly n+1 times per coarse step.

use nalgebra::{Matrix6, Vector6};

use crate::encounters::EncounterLog;
use crate::ephemeris::Ephemeris;
use crate::errors::Result;
use crate::forces::ForceModel;

/// Output of one modified-midpoint step over a particle batch
#[derive(Debug, Clone)]
pub struct MidpointResult {
    /// End-of-step states, one per particle
    pub states: Vec<Vector6<f64>>,
    /// End-of-step state-transition matrices when they were carried
    pub jacobians: Option<Vec<Matrix6<f64>>>,
}

/// Advance a batch over one coarse step of `substeps` equal substeps
pub fn midpoint_step<E: Ephemeris>(
    force: &ForceModel<'_, E>,
    t0: f64,
    h: f64,
    substeps: usize,
    states: &[Vector6<f64>],
    jacobians: Option<&[Matrix6<f64>]>,
    mut encounters: Option<&mut EncounterLog>,
) -> Result<MidpointResult> {
    let n = states.len();
    let dt = h / substeps as f64;
    let want_partials = jacobians.is_some();

    let mut q_prev: Vec<Vector6<f64>> = states.to_vec();
    let mut p_prev: Option<Vec<Matrix6<f64>>> = jacobians.map(|j| j.to_vec());

    let eval = force.eval(t0, &q_prev, want_partials, encounters.as_deref_mut(), dt)?;
    let mut q_curr: Vec<Vector6<f64>> = (0..n)
        .map(|i| q_prev[i] + dt * eval.derivatives[i])
        .collect();
    let mut p_curr = p_prev.as_ref().map(|p0| {
        let df = eval.partials.as_ref().expect("partials requested");
        (0..n).map(|i| p0[i] + dt * (df[i] * p0[i])).collect::<Vec<_>>()
    });

    for k in 1..substeps {
        let t = t0 + k as f64 * dt;
        let eval = force.eval(t, &q_curr, want_partials, encounters.as_deref_mut(), dt)?;

        for i in 0..n {
            let q_next = q_prev[i] + 2.0 * dt * eval.derivatives[i];
            q_prev[i] = std::mem::replace(&mut q_curr[i], q_next);
        }
        if let (Some(prev), Some(curr)) = (p_prev.as_mut(), p_curr.as_mut()) {
            let df = eval.partials.as_ref().expect("partials requested");
            for i in 0..n {
                let p_next = prev[i] + 2.0 * dt * (df[i] * curr[i]);
                prev[i] = std::mem::replace(&mut curr[i], p_next);
            }
        }
    }

    // Smoothing endpoint evaluation
    let eval = force.eval(t0 + h, &q_curr, want_partials, encounters.as_deref_mut(), dt)?;
    let states_out = (0..n)
        .map(|i| 0.5 * (q_curr[i] + q_prev[i] + dt * eval.derivatives[i]))
        .collect();
    let jacobians_out = p_curr.map(|curr| {
        let prev = p_prev.expect("previous matrices carried");
        let df = eval.partials.as_ref().expect("partials requested");
        (0..n)
            .map(|i| 0.5 * (curr[i] + prev[i] + dt * (df[i] * curr[i])))
            .collect()
    });

    Ok(MidpointResult {
        states: states_out,
        jacobians: jacobians_out,
    })
}
