//! SGP4/SDP4 Propagator (C2).
//!
//! Thin, pure wrapper over the `sgp4` crate implementing the AIAA
//! 2006-6753 recipe. Deep-space branch selection, secular/periodic
//! perturbation ordering and the near-singularity guards at zero
//! eccentricity/inclination are all handled inside `sgp4::Constants`;
//! this module is responsible only for instant conversion and error
//! mapping, kept deliberately free of any global state so it is safe to
//! call concurrently across satellites.

use chrono::{DateTime, Utc};

use crate::{OrbitalError, Result, StateVector};

pub(crate) fn propagate_from_constants(
    constants: &sgp4::Constants,
    tle_epoch: DateTime<Utc>,
    time: DateTime<Utc>,
) -> Result<StateVector> {
    let minutes_since_epoch = time.signed_duration_since(tle_epoch).num_milliseconds() as f64 / 60_000.0;

    let prediction = constants
        .propagate(minutes_since_epoch)
        .map_err(|e| OrbitalError::PropagationFailed(format!("{e:?}")))?;

    Ok(StateVector {
        position_eci_km: prediction.position,
        velocity_eci_km_s: prediction.velocity,
        epoch: time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iss_tle() -> tle_loader::TleRecord {
        let text = "ISS (ZARYA)\n\
1 25544U 98067A   24001.50000000  .00016717  00000-0  10270-3 0  9025\n\
2 25544  51.6400 208.9163 0006703 130.5360 325.0288 15.50377579999999\n";
        let (records, _) = tle_loader::load_str(text).unwrap();
        records.into_iter().next().unwrap()
    }

    #[test]
    fn leo_radius_is_plausible() {
        let tle = iss_tle();
        let state = crate::PropagatorState::build(&tle).unwrap();
        let sv = state.propagate(tle.epoch_instant).unwrap();
        let [x, y, z] = sv.position_eci_km;
        let r = (x * x + y * y + z * z).sqrt();
        // ISS orbits at ~400km altitude => radius ~6771-6800km.
        assert!(r > 6600.0 && r < 7200.0, "unexpected radius {r}");
    }
}
