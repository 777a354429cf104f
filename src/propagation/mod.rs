//! Top-level propagation drivers
//!
//! The entry points of the engine: [`bulirsch_full`] slices the interval
//! into whole steps plus a remainder and advances a particle batch with
//! extrapolated Bulirsch-Stoer steps, and [`gauss_radau_full`] hands the
//! batch to the adaptive Gauss-Radau sequence. Both consume a
//! [`Propagation`] value carrying the per-call settings that the original
//! engine kept as ambient state: the central body, the relativity flag,
//! the perturber mask, additional-perturber masses, and the radial
//! acceleration.
//!
//! Only one piece of process-wide state remains: the default of the
//! relativity flag, toggled with [`set_relativity`] and latched into each
//! `Propagation` when it is constructed. Concurrent propagations with
//! different central bodies are safe because every call threads its own
//! settings.

use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::{Matrix6, Vector6};

use crate::bulirsch::{bulirsch_step, midpoint_step, ExtrapolationMethod};
use crate::constants::{NUM_PERTURBERS, RSTEP_TOL};
use crate::encounters::EncounterLog;
use crate::ephemeris::{Body, Ephemeris};
use crate::errors::{Error, Result};
use crate::forces::ForceModel;
use crate::radau::{gauss_radau, IntegClass, RadauStats};


/// Process-wide default of the relativity flag; on unless toggled
static RELATIVITY_DEFAULT: AtomicBool = AtomicBool::new(true);

/// Set the process-wide default of the relativistic-correction flag
///
/// The default is read when a [`Propagation`] is constructed; calls
/// already in flight keep the value they latched.
pub fn set_relativity(enabled: bool) {
    RELATIVITY_DEFAULT.store(enabled, Ordering::Relaxed);
}

/// Current process-wide default of the relativity flag
pub fn relativity_enabled() -> bool {
    RELATIVITY_DEFAULT.load(Ordering::Relaxed)
}

/// Per-call propagation settings
#[derive(Debug, Clone)]
pub struct Propagation {
    /// Central body whose GM defines the Keplerian part of the force
    pub central_body: Body,
    /// Apply the relativistic correction of the central body
    pub relativity: bool,
    /// Active planetary perturbers, indexed Mercury … Moon
    pub planet_mask: [bool; NUM_PERTURBERS],
    /// Number of minor-body perturbers drawn from the ephemeris
    pub asteroid_perturbers: usize,
    /// Step size; the whole interval (Bulirsch-Stoer) or an automatic
    /// first guess (Gauss-Radau) when absent
    pub step: Option<f64>,
    /// Particle masses in solar masses; positive entries mark additional
    /// massive perturbers integrated with the batch
    pub masses: Option<Vec<f64>>,
    /// Radially outward acceleration on massless particles, AU/day²
    pub radial_acceleration: Option<f64>,
    /// Extrapolation recurrence used by the Bulirsch-Stoer table
    pub extrapolation: ExtrapolationMethod,
}

impl Default for Propagation {
    fn default() -> Self {
        Propagation {
            central_body: Body::Sun,
            relativity: relativity_enabled(),
            planet_mask: [true; NUM_PERTURBERS],
            asteroid_perturbers: 0,
            step: None,
            masses: None,
            radial_acceleration: None,
            extrapolation: ExtrapolationMethod::Polynomial,
        }
    }
}

impl Propagation {
    /// Settings for a pure two-body problem: every perturber masked off
    /// and the relativistic correction disabled
    pub fn kepler_only() -> Self {
        Propagation {
            relativity: false,
            planet_mask: [false; NUM_PERTURBERS],
            ..Propagation::default()
        }
    }

    /// Build the force model latched to these settings
    fn force_model<'a, E: Ephemeris>(&self, ephemeris: &'a E) -> ForceModel<'a, E> {
        let mut force = ForceModel::new(ephemeris);
        force.central_body = self.central_body;
        force.relativity = self.relativity;
        force.planet_mask = self.planet_mask;
        force.asteroid_perturbers = self.asteroid_perturbers;
        force.masses = self.masses.clone();
        force.radial_acceleration = self.radial_acceleration;
        force
    }
}

/// Diagnostics of one Bulirsch-Stoer propagation
#[derive(Debug, Clone, Default)]
pub struct BulirschInfo {
    /// Extrapolated steps taken (whole steps plus any remainder step)
    pub steps: usize,
    /// Largest midpoint row count any step needed
    pub max_rows: usize,
    /// Particles left unconverged by at least one step
    pub unconverged: Vec<usize>,
}

/// Propagate a batch from `t0` to `t1` with the Bulirsch-Stoer integrator
///
/// The interval is sliced into `⌊|t1−t0|/|h|⌋` whole steps of the signed
/// step size plus a remainder; a remainder below the extrapolation
/// threshold is finished with a plain ten-substep midpoint step instead of
/// a full table. States, Jacobians and the encounter log are updated in
/// place; unconverged particles are reported, not failed.
pub fn bulirsch_full<E: Ephemeris>(
    ephemeris: &E,
    t0: f64,
    t1: f64,
    states: &mut [Vector6<f64>],
    mut jacobians: Option<&mut [Matrix6<f64>]>,
    mut encounters: Option<&mut EncounterLog>,
    opts: &Propagation,
) -> Result<BulirschInfo> {
    let mut info = BulirschInfo::default();
    let interval = t1 - t0;
    if states.is_empty() || interval == 0.0 {
        return Ok(info);
    }
    if let Some(log) = encounters.as_deref_mut() {
        log.check_capacity(states.len())?;
    }

    let force = opts.force_model(ephemeris);
    let h = match opts.step {
        Some(step) => step.abs() * interval.signum(),
        None => interval,
    };
    let total = (interval / h).abs().floor() as usize;
    let rem = interval - total as f64 * h;
    if rem.abs() > h.abs() {
        return Err(Error::RemainderExceedsStep {
            remainder: rem,
            step: h,
        });
    }

    let mut tm = t0;
    for _ in 0..total {
        let step_info = bulirsch_step(
            &force,
            tm,
            h,
            states,
            jacobians.as_deref_mut(),
            encounters.as_deref_mut(),
            opts.extrapolation,
        )?;
        info.steps += 1;
        info.max_rows = info.max_rows.max(step_info.rows_used);
        for p in step_info.unconverged {
            if !info.unconverged.contains(&p) {
                info.unconverged.push(p);
            }
        }
        tm += h;
    }

    if rem != 0.0 {
        if rem.abs() > RSTEP_TOL {
            let step_info = bulirsch_step(
                &force,
                tm,
                rem,
                states,
                jacobians.as_deref_mut(),
                encounters.as_deref_mut(),
                opts.extrapolation,
            )?;
            info.steps += 1;
            info.max_rows = info.max_rows.max(step_info.rows_used);
            for p in step_info.unconverged {
                if !info.unconverged.contains(&p) {
                    info.unconverged.push(p);
                }
            }
        } else {
            // Remainder at rounding level: one cheap midpoint finisher
            let result = midpoint_step(
                &force,
                tm,
                rem,
                10,
                states,
                jacobians.as_deref(),
                encounters.as_deref_mut(),
            )?;
            states.copy_from_slice(&result.states);
            if let (Some(out), Some(new)) = (jacobians.as_deref_mut(), result.jacobians) {
                out.copy_from_slice(&new);
            }
        }
    }

    Ok(info)
}

/// Propagate a batch from `t0` to `t1` with the Gauss-Radau 15 integrator
///
/// `ll ≥ 0` selects the adaptive tolerance ss = 10^(−ll); a negative `ll`
/// fixes the step at the supplied size. Variational equations are not
/// available in this integrator; passing Jacobians is an error.
#[allow(clippy::too_many_arguments)]
pub fn gauss_radau_full<E: Ephemeris>(
    ephemeris: &E,
    t0: f64,
    t1: f64,
    states: &mut [Vector6<f64>],
    ll: f64,
    class: IntegClass,
    jacobians: Option<&mut [Matrix6<f64>]>,
    mut encounters: Option<&mut EncounterLog>,
    opts: &Propagation,
) -> Result<RadauStats> {
    if jacobians.is_some() {
        return Err(Error::JacobiansNotAvailable);
    }
    if let Some(log) = encounters.as_deref_mut() {
        log.check_capacity(states.len())?;
    }
    let force = opts.force_model(ephemeris);
    gauss_radau(&force, t0, t1, states, ll, class, opts.step, encounters)
}
