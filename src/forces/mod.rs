//! Force model for the equations of motion
//!
//! Evaluates the time derivative of each particle's Cartesian state under
//! the central body's Keplerian attraction, the masked planetary
//! perturbers, optional minor-body perturbers, optional additional massive
//! perturbers carried in the batch, the first-order relativistic
//! correction of the central body, and an optional radial
//! (radiation-pressure-like) acceleration. On request it also produces the
//! 6×6 partial-derivative matrix of the state derivative with respect to
//! the state, which drives the variational equations.
//!
//! Perturber states come from the [`Ephemeris`] collaborator as
//! heliocentric vectors and are shifted to the chosen central body here.
//! Every evaluation reports particle-perturber distances to the
//! [`EncounterLog`].

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use ndarray::Array2;

use crate::constants::{C_AUDAY2, GAUSS_GM, NUM_PERTURBERS, PLANETARY_RADII, SUN};
use crate::encounters::{EncounterCategory, EncounterLog, EncounterRecord, CATALOG_BODIES};
use crate::ephemeris::{Body, Ephemeris};
use crate::errors::{Error, Result};

/// Result of one force-model evaluation
#[derive(Debug, Clone)]
pub struct ForceEval {
    /// Time derivative of each particle's state: velocity stacked over
    /// acceleration, AU/day and AU/day²
    pub derivatives: Vec<Vector6<f64>>,
    /// Partial derivatives ∂(state derivative)/∂(state), one 6×6 matrix
    /// per particle, present when partials were requested
    pub partials: Option<Vec<Matrix6<f64>>>,
}

/// One perturbing body resolved to the central-body frame for this call
struct Perturber {
    /// 1-based catalogue index, or `None` for a minor body
    catalog: Option<usize>,
    /// Gm in AU³/day²
    gm: f64,
    /// Collision radius in AU (zero when unknown)
    radius: f64,
    /// Position relative to the central body
    position: Vector3<f64>,
    /// Indirect acceleration term r_j/|r_j|³, applied to every particle
    indirect: Vector3<f64>,
}

/// Right-hand side of the equations of motion
///
/// The central body and the relativity flag are latched at construction
/// for the duration of the call chain; concurrent evaluations with
/// different settings use separate `ForceModel` values.
pub struct ForceModel<'a, E: Ephemeris> {
    ephemeris: &'a E,
    /// Central body whose GM defines the Keplerian part of the force
    pub central_body: Body,
    /// Apply the first-order relativistic correction (Sun-centered only)
    pub relativity: bool,
    /// Active planetary perturbers, indexed Mercury … Moon
    pub planet_mask: [bool; NUM_PERTURBERS],
    /// Number of minor-body perturbers drawn from the ephemeris
    pub asteroid_perturbers: usize,
    /// Masses of the integrated particles, in solar masses; a positive
    /// entry marks an additional massive perturber
    pub masses: Option<Vec<f64>>,
    /// Radially outward acceleration applied to massless particles, AU/day²
    pub radial_acceleration: Option<f64>,
}

impl<'a, E: Ephemeris> ForceModel<'a, E> {
    /// Create a Sun-centered force model with every planetary perturber
    /// active and relativity on
    pub fn new(ephemeris: &'a E) -> Self {
        ForceModel {
            ephemeris,
            central_body: Body::Sun,
            relativity: true,
            planet_mask: [true; NUM_PERTURBERS],
            asteroid_perturbers: 0,
            masses: None,
            radial_acceleration: None,
        }
    }

    /// Mass of particle `i`, zero when no mass vector was supplied
    fn particle_mass(&self, i: usize) -> f64 {
        self.masses.as_ref().map_or(0.0, |m| m[i])
    }

    /// Resolve the active perturber set to the central-body frame
    fn gather_perturbers(&self, t_mjd: f64) -> Result<Vec<Perturber>> {
        let central = self.central_body.index();
        let need_planets =
            self.planet_mask.iter().any(|&on| on) || central != SUN;

        let mut perturbers = Vec::new();
        let mut central_pos = Vector3::zeros();

        if need_planets {
            let planets = self.ephemeris.planet_states(t_mjd)?;
            if central != SUN {
                central_pos = planets[central - 1].fixed_rows::<3>(0).into_owned();
            }

            for (j, state) in planets.iter().enumerate() {
                let catalog = j + 1;
                if !self.planet_mask[j] || catalog == central {
                    continue;
                }
                let position = state.fixed_rows::<3>(0).into_owned() - central_pos;
                let d = position.norm();
                perturbers.push(Perturber {
                    catalog: Some(catalog),
                    gm: Body::from_index(catalog).map_or(0.0, |b| b.mu()),
                    radius: PLANETARY_RADII[catalog],
                    position,
                    indirect: position / (d * d * d),
                });
            }

            // With a planetary central body the Sun itself perturbs
            if central != SUN {
                let position = -central_pos;
                let d = position.norm();
                perturbers.push(Perturber {
                    catalog: Some(SUN),
                    gm: GAUSS_GM,
                    radius: PLANETARY_RADII[SUN],
                    position,
                    indirect: position / (d * d * d),
                });
            }
        }

        if self.asteroid_perturbers > 0 {
            let positions = self
                .ephemeris
                .asteroid_positions(t_mjd, self.asteroid_perturbers)?;
            let gms = self.ephemeris.asteroid_masses(self.asteroid_perturbers)?;
            for (pos, mass) in positions.into_iter().zip(gms) {
                let position = pos - central_pos;
                let d = position.norm();
                perturbers.push(Perturber {
                    catalog: None,
                    gm: GAUSS_GM * mass,
                    radius: 0.0,
                    position,
                    indirect: position / (d * d * d),
                });
            }
        }

        Ok(perturbers)
    }

    /// Evaluate the state derivative of every particle at epoch `t_mjd`
    ///
    /// # Arguments
    /// * `states` — particle states relative to the central body
    /// * `want_partials` — also produce ∂(derivative)/∂(state)
    /// * `encounters` — log receiving this call's distance records
    /// * `substep` — substep size in effect, stamped on each record
    pub fn eval(
        &self,
        t_mjd: f64,
        states: &[Vector6<f64>],
        want_partials: bool,
        mut encounters: Option<&mut EncounterLog>,
        substep: f64,
    ) -> Result<ForceEval> {
        let n = states.len();
        let central = self.central_body.index();
        let mu_c = self.central_body.mu();

        if self.relativity && central != SUN {
            return Err(Error::RelativityRequiresSun {
                central_body: central,
            });
        }

        let perturbers = self.gather_perturbers(t_mjd)?;

        // Per-call scratch: particle-perturber distances and inverse cubes,
        // shared between the acceleration and partial-derivative passes
        let mut dist = Array2::<f64>::zeros((perturbers.len(), n));
        let mut inv_r3 = Array2::<f64>::zeros((perturbers.len(), n));
        for (j, pert) in perturbers.iter().enumerate() {
            for (i, state) in states.iter().enumerate() {
                let delta = pert.position - state.fixed_rows::<3>(0);
                let d = delta.norm();
                dist[(j, i)] = d;
                inv_r3[(j, i)] = 1.0 / (d * d * d);
            }
        }

        let additional: Vec<usize> = (0..n).filter(|&i| self.particle_mass(i) > 0.0).collect();

        let mut derivatives = Vec::with_capacity(n);
        let mut partials = if want_partials {
            Some(Vec::with_capacity(n))
        } else {
            None
        };

        for (i, state) in states.iter().enumerate() {
            let r_vec = state.fixed_rows::<3>(0).into_owned();
            let v_vec = state.fixed_rows::<3>(3).into_owned();
            let r = r_vec.norm();
            let inv_rc3 = 1.0 / (r * r * r);
            let massless = self.particle_mass(i) == 0.0;

            let mut acc = -mu_c * inv_rc3 * r_vec;

            for (j, pert) in perturbers.iter().enumerate() {
                let delta = pert.position - r_vec;
                acc += pert.gm * (inv_r3[(j, i)] * delta - pert.indirect);

                if let (Some(log), Some(catalog)) = (encounters.as_deref_mut(), pert.catalog) {
                    log.record(i, catalog, encounter_record(t_mjd, dist[(j, i)], pert.radius, substep));
                }
            }

            // The central body's own record; the Sun's row is kept
            // regardless of the perturber mask
            if let Some(log) = encounters.as_deref_mut() {
                log.record(i, central, encounter_record(t_mjd, r, PLANETARY_RADII[central], substep));
            }

            // Additional massive perturbers act on massless particles only
            if massless {
                for (ordinal, &k) in additional.iter().enumerate() {
                    if k == i {
                        continue;
                    }
                    let r_k = states[k].fixed_rows::<3>(0).into_owned();
                    let delta = r_k - r_vec;
                    let d = delta.norm();
                    let dk = r_k.norm();
                    let gm_k = GAUSS_GM * self.particle_mass(k);
                    acc += gm_k * (delta / (d * d * d) - r_k / (dk * dk * dk));

                    if let Some(log) = encounters.as_deref_mut() {
                        let body = CATALOG_BODIES + 1 + ordinal;
                        if body <= log.bodies() {
                            // Size unknown, so the record can never be an impact
                            log.record(
                                i,
                                body,
                                EncounterRecord {
                                    mjd: t_mjd,
                                    category: EncounterCategory::Approach,
                                    distance: d,
                                    substep,
                                },
                            );
                        }
                    }
                }

                if let Some(a_rad) = self.radial_acceleration {
                    acc += a_rad / r * r_vec;
                }
            }

            if self.relativity {
                acc += relativistic_acceleration(mu_c, &r_vec, &v_vec);
            }

            if !acc.iter().all(|a| a.is_finite()) {
                return Err(Error::NonFiniteState { t: t_mjd });
            }

            let mut deriv = Vector6::zeros();
            deriv.fixed_rows_mut::<3>(0).copy_from(&v_vec);
            deriv.fixed_rows_mut::<3>(3).copy_from(&acc);
            derivatives.push(deriv);

            if let Some(jacobians) = partials.as_mut() {
                let mut da_dr = point_mass_gradient(mu_c, &r_vec);
                for (j, pert) in perturbers.iter().enumerate() {
                    let delta = pert.position - r_vec;
                    let d = dist[(j, i)];
                    let d5 = d * d * d * d * d;
                    da_dr += pert.gm
                        * (3.0 / d5 * (delta * delta.transpose())
                            - inv_r3[(j, i)] * Matrix3::identity());
                }
                if massless {
                    for &k in &additional {
                        if k == i {
                            continue;
                        }
                        let r_k = states[k].fixed_rows::<3>(0).into_owned();
                        let delta = r_k - r_vec;
                        let d = delta.norm();
                        let d3 = d * d * d;
                        let d5 = d3 * d * d;
                        let gm_k = GAUSS_GM * self.particle_mass(k);
                        da_dr += gm_k
                            * (3.0 / d5 * (delta * delta.transpose())
                                - Matrix3::identity() / d3);
                    }
                }

                let mut da_dv = Matrix3::zeros();
                if self.relativity {
                    let (rel_dr, rel_dv) = relativistic_gradients(mu_c, &r_vec, &v_vec);
                    da_dr += rel_dr;
                    da_dv += rel_dv;
                }

                let mut jac = Matrix6::zeros();
                jac.fixed_view_mut::<3, 3>(0, 3)
                    .copy_from(&Matrix3::identity());
                jac.fixed_view_mut::<3, 3>(3, 0).copy_from(&da_dr);
                jac.fixed_view_mut::<3, 3>(3, 3).copy_from(&da_dv);
                jacobians.push(jac);
            }
        }

        Ok(ForceEval {
            derivatives,
            partials,
        })
    }
}

/// Classify one distance against a collision radius
fn encounter_record(mjd: f64, distance: f64, radius: f64, substep: f64) -> EncounterRecord {
    let category = if distance < radius {
        EncounterCategory::Impact
    } else {
        EncounterCategory::Approach
    };
    EncounterRecord {
        mjd,
        category,
        distance,
        substep,
    }
}

/// Gradient of the point-mass acceleration −μ r/|r|³ with respect to r
fn point_mass_gradient(mu: f64, r_vec: &Vector3<f64>) -> Matrix3<f64> {
    let r = r_vec.norm();
    let r3 = r * r * r;
    let r5 = r3 * r * r;
    mu * (3.0 / r5 * (r_vec * r_vec.transpose()) - Matrix3::identity() / r3)
}

/// First-order relativistic correction of the central body, isotropic
/// coordinates:
///
///   a = μ/c² · [ (4μ/r − v²)·r/r³ + 4(r·v)·v/r³ ]
fn relativistic_acceleration(mu: f64, r_vec: &Vector3<f64>, v_vec: &Vector3<f64>) -> Vector3<f64> {
    let r = r_vec.norm();
    let r3 = r * r * r;
    let v2 = v_vec.dot(v_vec);
    let rv = r_vec.dot(v_vec);
    mu / C_AUDAY2 * ((4.0 * mu / r - v2) / r3 * r_vec + 4.0 * rv / r3 * v_vec)
}

/// Position and velocity gradients of the relativistic correction
fn relativistic_gradients(
    mu: f64,
    r_vec: &Vector3<f64>,
    v_vec: &Vector3<f64>,
) -> (Matrix3<f64>, Matrix3<f64>) {
    let r = r_vec.norm();
    let r3 = r * r * r;
    let r4 = r3 * r;
    let r5 = r4 * r;
    let r6 = r5 * r;
    let v2 = v_vec.dot(v_vec);
    let rv = r_vec.dot(v_vec);
    let scale = mu / C_AUDAY2;

    let da_dr = scale
        * ((4.0 * mu / r4 - v2 / r3) * Matrix3::identity()
            + r_vec * ((3.0 * v2 / r5 - 16.0 * mu / r6) * r_vec.transpose())
            + 4.0 / r3 * (v_vec * v_vec.transpose())
            - 12.0 * rv / r5 * (v_vec * r_vec.transpose()));

    let da_dv = scale
        * (-2.0 / r3 * (r_vec * v_vec.transpose())
            + 4.0 / r3 * (rv * Matrix3::identity() + v_vec * r_vec.transpose()));

    (da_dr, da_dv)
}
