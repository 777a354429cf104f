//! # Orrery: solar-system N-body propagation engine
//!
//! Advances the Cartesian states of many massless test particles (and
//! optionally a few additional massive bodies) through a Newtonian
//! gravitational field with optional first-order relativistic correction
//! and optional radial acceleration. Three propagators share one force
//! model:
//!
//! - [`propagation::bulirsch_full`] — Bulirsch-Stoer variable-order
//!   extrapolation on the modified-midpoint method, with optional
//!   state-transition matrices
//! - [`propagation::gauss_radau_full`] — Everhart's 15th-order implicit
//!   Gauss-Radau sequence with adaptive step control
//! - [`keplerlib::kepler_step`] — the exact two-body flow in universal
//!   variables
//!
//! Perturber positions come from a caller-supplied [`ephemeris::Ephemeris`]
//! implementation; close approaches and impacts with the major bodies are
//! collected in an [`encounters::EncounterLog`].
//!
//! Units are AU, days and solar masses throughout, in a heliocentric
//! equatorial frame by default. In this system the gravitational constant
//! is the square of the Gaussian constant k and epochs are MJD.
//!
//! # Example
//!
//! ```ignore
//! use orrery::{bulirsch_full, kepler_step, Body, Propagation};
//! use nalgebra::Vector6;
//!
//! // An Earth-like circular orbit, propagated one year two ways
//! let s0 = Vector6::new(1.0, 0.0, 0.0, 0.0, 0.01720209895, 0.0);
//! let exact = kepler_step(Body::Sun, 365.25, &s0)?;
//!
//! let mut states = [s0];
//! let opts = Propagation::kepler_only();
//! bulirsch_full(&my_ephemeris, 0.0, 365.25, &mut states, None, None, &opts)?;
//! ```

pub mod bulirsch;
pub mod constants;
pub mod encounters;
pub mod ephemeris;
pub mod errors;
pub mod forces;
pub mod keplerlib;
pub mod propagation;
pub mod radau;

pub use bulirsch::ExtrapolationMethod;
pub use encounters::{EncounterCategory, EncounterLog, EncounterRecord};
pub use ephemeris::{Body, Ephemeris, FixedEphemeris, NoEphemeris};
pub use errors::{Error, Result};
pub use forces::ForceModel;
pub use keplerlib::kepler_step;
pub use propagation::{
    bulirsch_full, gauss_radau_full, relativity_enabled, set_relativity, BulirschInfo, Propagation,
};
pub use radau::{IntegClass, RadauStats};
