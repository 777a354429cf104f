//! Error types for the propagation engine

use thiserror::Error;

/// Main error type for propagation functionality
#[derive(Error, Debug)]
pub enum Error {
    /// Error when the ephemeris collaborator fails for a given epoch
    #[error("Ephemeris lookup failed at MJD {t}: {reason}")]
    Ephemeris { t: f64, reason: String },

    /// Error when an iterative solver exhausts its retries
    #[error("{component} failed to converge: {detail}")]
    NonConvergence {
        component: &'static str,
        detail: String,
    },

    /// Error when the relativistic correction is requested with a central
    /// body other than the Sun
    #[error("relativistic correction requires the Sun as central body (got body {central_body})")]
    RelativityRequiresSun { central_body: usize },

    /// Error when the interval remainder exceeds the step size in the
    /// top-level driver
    #[error("interval remainder {remainder} exceeds step size {step}")]
    RemainderExceedsStep { remainder: f64, step: f64 },

    /// Error when an integrator is handed an empty particle batch
    #[error("particle batch is empty")]
    EmptyBatch,

    /// Error when the hyperbolic Kepler argument b·x/2 exceeds the
    /// overflow guard
    #[error("hyperbolic anomaly argument {arg} exceeds overflow guard {limit}")]
    HyperbolicOverflow { arg: f64, limit: f64 },

    /// Error when the caller's encounter table cannot hold all records
    #[error("encounter table holds {particles} particles, {needed} needed")]
    EncounterBufferTooSmall { particles: usize, needed: usize },

    /// Error when Jacobians are requested from the Gauss-Radau integrator
    #[error("variational equations are not available in the Gauss-Radau integrator")]
    JacobiansNotAvailable,

    /// Error when the force model produces a non-finite result
    #[error("non-finite state encountered at MJD {t}")]
    NonFiniteState { t: f64 },
}

/// Result type for propagation operations
pub type Result<T> = std::result::Result<T, Error>;
