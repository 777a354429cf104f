//! Physical constants and integrator tuning parameters
//!
//! The engine works in heliocentric equatorial coordinates with lengths in
//! AU, times in days, and masses in solar masses. In this unit system the
//! gravitational constant is the square of the Gaussian gravitational
//! constant k, and the Sun's gravitational parameter GM equals G exactly.

/// Astronomical unit in kilometers (IAU 2012 exact value)
pub const AU_KM: f64 = 149_597_870.700;

/// Seconds per day
pub const DAY_S: f64 = 86_400.0;

/// Gaussian gravitational constant k, AU^(3/2) day^(-1) Msun^(-1/2)
pub const GAUSS_K: f64 = 0.017_202_098_95;

/// Gravitational constant G = k² in AU³ day⁻² Msun⁻¹
pub const GAUSS_GM: f64 = GAUSS_K * GAUSS_K;

/// Speed of light in AU/day
pub const C_AUDAY: f64 = 173.144_632_72;

/// Speed of light squared, AU²/day²
pub const C_AUDAY2: f64 = C_AUDAY * C_AUDAY;

/// Number of ephemeris-supplied perturbing bodies (Mercury … Pluto, Moon)
pub const NUM_PERTURBERS: usize = 10;

/// Body index of the Sun in the 1-based planetary tables
pub const SUN: usize = 11;

/// Masses of the major bodies in solar masses, indexed
/// 1 = Mercury … 9 = Pluto, 10 = Moon, 11 = Sun (index 0 unused).
///
/// Values are the reciprocals of the IAU mass ratios Msun/Mbody.
pub const PLANETARY_MASSES: [f64; 12] = [
    0.0,
    1.0 / 6_023_600.0,          // Mercury
    1.0 / 408_523.71,           // Venus
    1.0 / 332_946.050895,       // Earth
    1.0 / 3_098_708.0,          // Mars
    1.0 / 1_047.3486,           // Jupiter
    1.0 / 3_497.898,            // Saturn
    1.0 / 22_902.98,            // Uranus
    1.0 / 19_412.24,            // Neptune
    1.0 / 135_200_000.0,        // Pluto
    1.0 / 27_068_700.387534,    // Moon
    1.0,                        // Sun
];

/// Gravitational parameters GM = G·m of the major bodies, AU³/day²,
/// same indexing as [`PLANETARY_MASSES`].
pub const PLANETARY_MU: [f64; 12] = [
    0.0,
    GAUSS_GM * PLANETARY_MASSES[1],
    GAUSS_GM * PLANETARY_MASSES[2],
    GAUSS_GM * PLANETARY_MASSES[3],
    GAUSS_GM * PLANETARY_MASSES[4],
    GAUSS_GM * PLANETARY_MASSES[5],
    GAUSS_GM * PLANETARY_MASSES[6],
    GAUSS_GM * PLANETARY_MASSES[7],
    GAUSS_GM * PLANETARY_MASSES[8],
    GAUSS_GM * PLANETARY_MASSES[9],
    GAUSS_GM * PLANETARY_MASSES[10],
    GAUSS_GM,
];

/// Collision radii of the major bodies in AU (equatorial radii),
/// same indexing as [`PLANETARY_MASSES`].
pub const PLANETARY_RADII: [f64; 12] = [
    0.0,
    2_439.7 / AU_KM,   // Mercury
    6_051.8 / AU_KM,   // Venus
    6_378.140 / AU_KM, // Earth
    3_396.19 / AU_KM,  // Mars
    71_492.0 / AU_KM,  // Jupiter
    60_268.0 / AU_KM,  // Saturn
    25_559.0 / AU_KM,  // Uranus
    24_764.0 / AU_KM,  // Neptune
    1_188.3 / AU_KM,   // Pluto
    1_737.4 / AU_KM,   // Moon
    696_000.0 / AU_KM, // Sun
];

/// Substep doubling sequence for the Bulirsch-Stoer modified-midpoint rows
pub const BS_SEQUENCE: [usize; 27] = [
    2, 4, 6, 8, 12, 16, 24, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768,
    1024, 1536, 2048, 3072, 4096, 6144, 8192, 12288, 16384, 24576,
];

/// Convergence tolerance for the Bulirsch-Stoer extrapolation diagonal
pub const BS_EXTRAPOL_TOL: f64 = 10.0 * f64::EPSILON;

/// Threshold below which an interval remainder is integrated with a plain
/// modified-midpoint finisher instead of a full extrapolated step
pub const RSTEP_TOL: f64 = 10.0 * f64::EPSILON;
