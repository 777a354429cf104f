//! Ephemeris port consumed by the force model
//!
//! The engine never reads ephemeris files itself; it queries a collaborator
//! through the narrow [`Ephemeris`] trait for heliocentric states of the
//! major perturbers and for a catalogue of minor-body perturbers. Two
//! in-crate implementations are provided: [`NoEphemeris`] for pure two-body
//! work where every perturber is masked off, and [`FixedEphemeris`] which
//! pins every perturber to a caller-supplied state (used heavily by the
//! test suite for constructed close-approach geometries).

use nalgebra::{Vector3, Vector6};

use crate::constants::{NUM_PERTURBERS, PLANETARY_MASSES, PLANETARY_MU, PLANETARY_RADII, SUN};
use crate::errors::{Error, Result};

/// Major solar system bodies, in the engine's 1-based table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Body {
    Mercury,
    Venus,
    Earth,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
    Moon,
    Sun,
}

impl Body {
    /// Index into the planetary constant tables (1 = Mercury … 11 = Sun)
    pub fn index(&self) -> usize {
        match self {
            Body::Mercury => 1,
            Body::Venus => 2,
            Body::Earth => 3,
            Body::Mars => 4,
            Body::Jupiter => 5,
            Body::Saturn => 6,
            Body::Uranus => 7,
            Body::Neptune => 8,
            Body::Pluto => 9,
            Body::Moon => 10,
            Body::Sun => 11,
        }
    }

    /// Body for a 1-based table index
    pub fn from_index(index: usize) -> Option<Body> {
        match index {
            1 => Some(Body::Mercury),
            2 => Some(Body::Venus),
            3 => Some(Body::Earth),
            4 => Some(Body::Mars),
            5 => Some(Body::Jupiter),
            6 => Some(Body::Saturn),
            7 => Some(Body::Uranus),
            8 => Some(Body::Neptune),
            9 => Some(Body::Pluto),
            10 => Some(Body::Moon),
            11 => Some(Body::Sun),
            _ => None,
        }
    }

    /// Get the body's name
    pub fn name(&self) -> &'static str {
        match self {
            Body::Mercury => "Mercury",
            Body::Venus => "Venus",
            Body::Earth => "Earth",
            Body::Mars => "Mars",
            Body::Jupiter => "Jupiter",
            Body::Saturn => "Saturn",
            Body::Uranus => "Uranus",
            Body::Neptune => "Neptune",
            Body::Pluto => "Pluto",
            Body::Moon => "Moon",
            Body::Sun => "Sun",
        }
    }

    /// Mass in solar masses
    pub fn mass(&self) -> f64 {
        PLANETARY_MASSES[self.index()]
    }

    /// Gravitational parameter GM in AU³/day²
    pub fn mu(&self) -> f64 {
        PLANETARY_MU[self.index()]
    }

    /// Collision radius in AU
    pub fn radius(&self) -> f64 {
        PLANETARY_RADII[self.index()]
    }

    /// Whether this body is the Sun
    pub fn is_sun(&self) -> bool {
        self.index() == SUN
    }
}

/// Source of perturber states for the force model
///
/// States are heliocentric equatorial, positions in AU and velocities in
/// AU/day, at the requested epoch (MJD). Implementations are synchronous
/// and must be deterministic for a given epoch.
pub trait Ephemeris {
    /// Heliocentric states of the ten major perturbers at epoch `t_mjd`,
    /// in table order (Mercury … Pluto, Moon).
    fn planet_states(&self, t_mjd: f64) -> Result<[Vector6<f64>; NUM_PERTURBERS]>;

    /// Heliocentric positions of the first `n` minor-body perturbers
    /// at epoch `t_mjd`.
    fn asteroid_positions(&self, t_mjd: f64, n: usize) -> Result<Vec<Vector3<f64>>>;

    /// Masses of the first `n` minor-body perturbers, in solar masses.
    fn asteroid_masses(&self, n: usize) -> Result<Vec<f64>>;
}

/// Ephemeris that refuses every query
///
/// For Kepler-only propagations with every perturber masked off: the force
/// model never touches the ephemeris, so any query marks a logic error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEphemeris;

impl Ephemeris for NoEphemeris {
    fn planet_states(&self, t_mjd: f64) -> Result<[Vector6<f64>; NUM_PERTURBERS]> {
        Err(Error::Ephemeris {
            t: t_mjd,
            reason: "no ephemeris attached".to_string(),
        })
    }

    fn asteroid_positions(&self, t_mjd: f64, _n: usize) -> Result<Vec<Vector3<f64>>> {
        Err(Error::Ephemeris {
            t: t_mjd,
            reason: "no ephemeris attached".to_string(),
        })
    }

    fn asteroid_masses(&self, _n: usize) -> Result<Vec<f64>> {
        Err(Error::Ephemeris {
            t: 0.0,
            reason: "no ephemeris attached".to_string(),
        })
    }
}

/// Ephemeris with every body pinned to a fixed state
///
/// Planet states do not move with time; minor bodies are optional. Useful
/// for constructing exact close-approach geometries in tests.
#[derive(Debug, Clone)]
pub struct FixedEphemeris {
    /// Heliocentric states of the ten major perturbers
    pub planets: [Vector6<f64>; NUM_PERTURBERS],
    /// Fixed minor-body positions
    pub asteroids: Vec<Vector3<f64>>,
    /// Minor-body masses in solar masses
    pub masses: Vec<f64>,
}

impl Default for FixedEphemeris {
    fn default() -> Self {
        FixedEphemeris {
            planets: [Vector6::zeros(); NUM_PERTURBERS],
            asteroids: Vec::new(),
            masses: Vec::new(),
        }
    }
}

impl FixedEphemeris {
    /// Place one perturber at a heliocentric position, leaving the rest
    /// at the origin
    ///
    /// `body` must be one of the ten catalogued perturbers, not the Sun.
    /// Callers should mask the unplaced perturbers off; a perturber pinned
    /// to the origin coincides with the Sun.
    pub fn with_body_at(body: Body, position: Vector3<f64>) -> Self {
        let mut eph = FixedEphemeris::default();
        let mut state = Vector6::zeros();
        state.fixed_rows_mut::<3>(0).copy_from(&position);
        eph.planets[body.index() - 1] = state;
        eph
    }
}

impl Ephemeris for FixedEphemeris {
    fn planet_states(&self, _t_mjd: f64) -> Result<[Vector6<f64>; NUM_PERTURBERS]> {
        Ok(self.planets)
    }

    fn asteroid_positions(&self, t_mjd: f64, n: usize) -> Result<Vec<Vector3<f64>>> {
        if n > self.asteroids.len() {
            return Err(Error::Ephemeris {
                t: t_mjd,
                reason: format!("{} minor bodies requested, {} known", n, self.asteroids.len()),
            });
        }
        Ok(self.asteroids[..n].to_vec())
    }

    fn asteroid_masses(&self, n: usize) -> Result<Vec<f64>> {
        if n > self.masses.len() {
            return Err(Error::Ephemeris {
                t: 0.0,
                reason: format!("{} minor-body masses requested, {} known", n, self.masses.len()),
            });
        }
        Ok(self.masses[..n].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_body_index_roundtrip() {
        for i in 1..=11 {
            let body = Body::from_index(i).unwrap();
            assert_eq!(body.index(), i);
        }
        assert!(Body::from_index(0).is_none());
        assert!(Body::from_index(12).is_none());
    }

    #[test]
    fn test_sun_parameters() {
        assert!(Body::Sun.is_sun());
        assert_relative_eq!(Body::Sun.mass(), 1.0);
        assert_relative_eq!(Body::Sun.mu(), crate::constants::GAUSS_GM);
    }

    #[test]
    fn test_no_ephemeris_refuses() {
        let eph = NoEphemeris;
        assert!(eph.planet_states(51544.0).is_err());
        assert!(eph.asteroid_positions(51544.0, 1).is_err());
    }

    #[test]
    fn test_fixed_ephemeris_body_placement() {
        let eph = FixedEphemeris::with_body_at(Body::Earth, Vector3::new(1.0, 0.0, 0.0));
        let planets = eph.planet_states(51544.0).unwrap();
        assert_relative_eq!(planets[Body::Earth.index() - 1][0], 1.0);
        assert_relative_eq!(planets[Body::Mercury.index() - 1].norm(), 0.0);
    }
}
