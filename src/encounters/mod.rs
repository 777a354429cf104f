//! Close-approach and impact bookkeeping
//!
//! Every force-model evaluation reports the distance between each
//! integrated particle and each catalogued body. The [`EncounterLog`]
//! keeps, per (particle, body) pair, the single record that survives the
//! merge law:
//!
//! - an impact with an earlier epoch beats any record with an equal or
//!   later epoch;
//! - among non-impacting records the smaller distance wins;
//! - an impact found in a nested call promotes a non-impact held at the
//!   outer level for the same pair.
//!
//! The body axis is 1-based to match the planetary tables (11 = Sun, always
//! recorded). When additional massive perturbers are carried, the log can
//! be widened so approaches to them are kept as well; those records never
//! become impacts because the bodies have no known radius.

use ndarray::Array2;

use crate::errors::{Error, Result};

/// Number of catalogued bodies every log carries (Mercury … Moon, Sun)
pub const CATALOG_BODIES: usize = 11;

/// Classification of an encounter record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterCategory {
    /// Distance dropped below the body's collision radius
    Impact,
    /// Closest approach without impact
    Approach,
    /// No observation recorded yet
    Unobserved,
}

impl EncounterCategory {
    /// Numeric code used in tabular output (1, 2, 3)
    pub fn code(&self) -> f64 {
        match self {
            EncounterCategory::Impact => 1.0,
            EncounterCategory::Approach => 2.0,
            EncounterCategory::Unobserved => 3.0,
        }
    }
}

/// One (particle, body) encounter record
#[derive(Debug, Clone, Copy)]
pub struct EncounterRecord {
    /// Epoch of the evaluation, MJD
    pub mjd: f64,
    /// Record classification
    pub category: EncounterCategory,
    /// Distance at the evaluation, AU
    pub distance: f64,
    /// Substep size in effect when the record was taken, days
    pub substep: f64,
}

impl Default for EncounterRecord {
    fn default() -> Self {
        EncounterRecord {
            mjd: 0.0,
            category: EncounterCategory::Unobserved,
            distance: f64::INFINITY,
            substep: 0.0,
        }
    }
}

impl EncounterRecord {
    /// Whether `candidate` replaces `self` under the merge law
    fn superseded_by(&self, candidate: &EncounterRecord) -> bool {
        match candidate.category {
            EncounterCategory::Impact => match self.category {
                EncounterCategory::Impact => candidate.mjd < self.mjd,
                _ => true,
            },
            EncounterCategory::Approach => match self.category {
                EncounterCategory::Impact => false,
                _ => candidate.distance < self.distance,
            },
            EncounterCategory::Unobserved => false,
        }
    }
}

/// Per-particle, per-body table of surviving encounter records
#[derive(Debug, Clone)]
pub struct EncounterLog {
    table: Array2<EncounterRecord>,
}

impl EncounterLog {
    /// Create a log for `particles` particles over the standard catalogue
    pub fn new(particles: usize) -> Self {
        EncounterLog {
            table: Array2::from_elem((particles, CATALOG_BODIES), EncounterRecord::default()),
        }
    }

    /// Create a log widened by `additional` columns for approaches to
    /// additional massive perturbers
    pub fn with_additional(particles: usize, additional: usize) -> Self {
        EncounterLog {
            table: Array2::from_elem(
                (particles, CATALOG_BODIES + additional),
                EncounterRecord::default(),
            ),
        }
    }

    /// Number of particle rows
    pub fn particles(&self) -> usize {
        self.table.nrows()
    }

    /// Number of body columns (≥ 11)
    pub fn bodies(&self) -> usize {
        self.table.ncols()
    }

    /// Check that the log can hold records for `needed` particles
    pub fn check_capacity(&self, needed: usize) -> Result<()> {
        if self.particles() < needed {
            return Err(Error::EncounterBufferTooSmall {
                particles: self.particles(),
                needed,
            });
        }
        Ok(())
    }

    /// Surviving record for a particle and a 1-based body index
    pub fn get(&self, particle: usize, body: usize) -> &EncounterRecord {
        &self.table[(particle, body - 1)]
    }

    /// Apply one candidate record under the merge law, 1-based body index
    pub fn record(&mut self, particle: usize, body: usize, candidate: EncounterRecord) {
        let cell = &mut self.table[(particle, body - 1)];
        if cell.superseded_by(&candidate) {
            *cell = candidate;
        }
    }

    /// Merge every surviving record of `other` into this log
    ///
    /// Both logs must cover the same particles; extra body columns in
    /// `other` beyond this log's width are dropped.
    pub fn merge(&mut self, other: &EncounterLog) {
        let bodies = self.bodies().min(other.bodies());
        for p in 0..self.particles().min(other.particles()) {
            for b in 0..bodies {
                let candidate = other.table[(p, b)];
                let cell = &mut self.table[(p, b)];
                if cell.superseded_by(&candidate) {
                    *cell = candidate;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn approach(mjd: f64, distance: f64) -> EncounterRecord {
        EncounterRecord {
            mjd,
            category: EncounterCategory::Approach,
            distance,
            substep: 1.0,
        }
    }

    fn impact(mjd: f64, distance: f64) -> EncounterRecord {
        EncounterRecord {
            mjd,
            category: EncounterCategory::Impact,
            distance,
            substep: 1.0,
        }
    }

    #[test]
    fn test_initial_state() {
        let log = EncounterLog::new(2);
        let rec = log.get(0, 11);
        assert_eq!(rec.category, EncounterCategory::Unobserved);
        assert!(rec.distance.is_infinite());
    }

    #[test]
    fn test_smaller_distance_wins() {
        let mut log = EncounterLog::new(1);
        log.record(0, 3, approach(100.0, 0.5));
        log.record(0, 3, approach(101.0, 0.2));
        log.record(0, 3, approach(102.0, 0.9));
        let rec = log.get(0, 3);
        assert_relative_eq!(rec.distance, 0.2);
        assert_relative_eq!(rec.mjd, 101.0);
    }

    #[test]
    fn test_impact_promotes_approach() {
        let mut log = EncounterLog::new(1);
        log.record(0, 3, approach(100.0, 1e-6));
        log.record(0, 3, impact(105.0, 3e-5));
        assert_eq!(log.get(0, 3).category, EncounterCategory::Impact);
        // An approach never demotes an impact, however close
        log.record(0, 3, approach(106.0, 1e-9));
        assert_eq!(log.get(0, 3).category, EncounterCategory::Impact);
    }

    #[test]
    fn test_earliest_impact_wins() {
        let mut log = EncounterLog::new(1);
        log.record(0, 3, impact(105.0, 3e-5));
        log.record(0, 3, impact(103.0, 4e-5));
        assert_relative_eq!(log.get(0, 3).mjd, 103.0);
        // Equal or later impacts do not replace the survivor
        log.record(0, 3, impact(103.0, 1e-5));
        assert_relative_eq!(log.get(0, 3).distance, 4e-5);
    }

    #[test]
    fn test_merge_matches_direct_recording() {
        // Recording the union of substeps directly must equal recording
        // halves into nested logs and merging them
        let records = [
            approach(100.0, 0.6),
            approach(100.5, 0.3),
            impact(101.0, 2e-5),
            approach(101.5, 0.4),
            impact(100.8, 3e-5),
        ];

        let mut direct = EncounterLog::new(1);
        for rec in &records {
            direct.record(0, 5, *rec);
        }

        let mut outer = EncounterLog::new(1);
        let mut nested = EncounterLog::new(1);
        for rec in &records[..2] {
            outer.record(0, 5, *rec);
        }
        for rec in &records[2..] {
            nested.record(0, 5, *rec);
        }
        outer.merge(&nested);

        let d = direct.get(0, 5);
        let m = outer.get(0, 5);
        assert_eq!(d.category, m.category);
        assert_relative_eq!(d.mjd, m.mjd);
        assert_relative_eq!(d.distance, m.distance);
    }

    #[test]
    fn test_capacity_check() {
        let log = EncounterLog::new(2);
        assert!(log.check_capacity(2).is_ok());
        assert!(matches!(
            log.check_capacity(3),
            Err(crate::errors::Error::EncounterBufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_widened_log() {
        let log = EncounterLog::with_additional(1, 2);
        assert_eq!(log.bodies(), 13);
    }
}
