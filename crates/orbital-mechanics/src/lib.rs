//! Orbital Mechanics Library
//!
//! SGP4/SDP4 propagation (C2), ECI/ECEF/topocentric geometry (C3) and
//! visibility-window extraction (C5) for the NTN handover decision core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod geometry;
pub mod propagation;
pub mod visibility;

pub use geometry::LookAngle;
pub use visibility::{find_visibility_windows, SamplePoint, TimeSeries, VisibilityWindow};

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("invalid TLE: {0}")]
    InvalidTle(String),
    #[error("propagation failed: {0}")]
    PropagationFailed(String),
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("epoch {requested} outside the ±72h validity window [{window_start}, {window_end}] for satellite {satellite_id}")]
    EpochOutOfValidityWindow {
        satellite_id: String,
        requested: DateTime<Utc>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    },
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// ECI state vector: position in km, velocity in km/s.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateVector {
    pub position_eci_km: [f64; 3],
    pub velocity_eci_km_s: [f64; 3],
    pub epoch: DateTime<Utc>,
}

/// WGS-84 geodetic position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

/// The ground user-equipment's fixed observation point. Process-wide,
/// immutable after initial configuration (spec.md §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Observer {
    pub geodetic_latitude_deg: f64,
    pub geodetic_longitude_deg: f64,
    pub altitude_m: f64,
    pub min_elevation_deg: f64,
}

/// `Propagator State` (spec.md §3): SGP4 constants derived from one
/// [`tle_loader::TleRecord`], owned 1:1 by a satellite. Rebuilt whenever
/// the TLE record is replaced; never shared mutably.
pub struct PropagatorState {
    pub satellite_id: String,
    pub tle_epoch: DateTime<Utc>,
    constants: sgp4::Constants,
}

/// Half-width of the propagator's validity window around its TLE epoch
/// (spec.md §3: "±72 h of its TLE epoch").
pub const VALIDITY_WINDOW_HOURS: i64 = 72;

impl PropagatorState {
    /// Build SGP4 constants from a validated TLE record.
    pub fn build(tle: &tle_loader::TleRecord) -> Result<Self> {
        let elements =
            sgp4::Elements::from_tle(None, tle.line1.as_bytes(), tle.line2.as_bytes())
                .map_err(|e| OrbitalError::InvalidTle(format!("{e:?}")))?;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| OrbitalError::PropagationFailed(format!("{e:?}")))?;

        Ok(PropagatorState {
            satellite_id: tle.satellite_id.clone(),
            tle_epoch: tle.epoch_instant,
            constants,
        })
    }

    /// `[epoch - 72h, epoch + 72h]`, the window outside which this state
    /// must refuse to emit samples rather than extrapolate.
    pub fn validity_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let half = chrono::Duration::hours(VALIDITY_WINDOW_HOURS);
        (self.tle_epoch - half, self.tle_epoch + half)
    }

    pub fn is_within_validity_window(&self, time: DateTime<Utc>) -> bool {
        let (start, end) = self.validity_window();
        time >= start && time <= end
    }

    /// Propagate to `time`, refusing (rather than extrapolating) outside
    /// the ±72h validity window.
    pub fn propagate(&self, time: DateTime<Utc>) -> Result<StateVector> {
        let (window_start, window_end) = self.validity_window();
        if time < window_start || time > window_end {
            return Err(OrbitalError::EpochOutOfValidityWindow {
                satellite_id: self.satellite_id.clone(),
                requested: time,
                window_start,
                window_end,
            });
        }
        propagation::propagate_from_constants(&self.constants, self.tle_epoch, time)
    }
}
