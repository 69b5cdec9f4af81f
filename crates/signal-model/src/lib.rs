//! Signal Model (C4): RSRP link budget and a secondary RSRQ derivation.
//!
//! `RSRP = EIRP + G_rx + G_elev(el) - FSPL(d,f) - L_atm - L_impl -
//! 10*log10(N_subcarriers)`, clamped to `[-140, -44] dBm` (spec.md §4.4).
//! `L_atm` always comes from the injected [`AtmosphericLossProvider`];
//! this crate never invents weather data.

use orbital_mechanics::Observer;
use thiserror::Error;
use tle_loader::ConstellationTag;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("invalid link-budget input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, SignalError>;

const RSRP_MIN_DBM: f64 = -140.0;
const RSRP_MAX_DBM: f64 = -44.0;
const RSRQ_MIN_DB: f64 = -20.0;
const RSRQ_MAX_DB: f64 = -3.0;

/// Per-constellation link-budget constants. Values follow the public
/// filings the distilled Python cites (Starlink: FCC SAT-MOD-20200417-
/// 00037; OneWeb: ITU BR IFIC coordination; unknown constellations fall
/// back to the 3GPP TS 38.821 NTN reference values).
#[derive(Debug, Clone, Copy)]
pub struct ConstellationParams {
    pub eirp_dbw: f64,
    pub carrier_ghz: f64,
    pub ground_antenna_gain_dbi: f64,
    pub implementation_loss_db: f64,
    pub subcarrier_count: f64,
    pub resource_block_count: f64,
    pub rssi_margin_db: f64,
}

impl ConstellationParams {
    pub fn for_tag(tag: ConstellationTag) -> Self {
        match tag {
            ConstellationTag::Starlink => ConstellationParams {
                eirp_dbw: 37.5,
                carrier_ghz: 12.0,
                ground_antenna_gain_dbi: 25.0,
                implementation_loss_db: 3.0,
                subcarrier_count: 1200.0,
                resource_block_count: 50.0,
                rssi_margin_db: 3.0,
            },
            ConstellationTag::OneWeb => ConstellationParams {
                eirp_dbw: 40.0,
                carrier_ghz: 12.25,
                ground_antenna_gain_dbi: 25.0,
                implementation_loss_db: 3.0,
                subcarrier_count: 1200.0,
                resource_block_count: 50.0,
                rssi_margin_db: 2.5,
            },
            ConstellationTag::Unknown => ConstellationParams {
                eirp_dbw: 42.0,
                carrier_ghz: 20.0,
                ground_antenna_gain_dbi: 25.0,
                implementation_loss_db: 3.0,
                subcarrier_count: 1200.0,
                resource_block_count: 50.0,
                rssi_margin_db: 3.5,
            },
        }
    }
}

/// Collaborator hook for atmospheric attenuation. The core never invents
/// weather data; a no-op provider returning zero is the correct default
/// when no weather feed is wired in.
pub trait AtmosphericLossProvider: Send + Sync {
    fn loss_db(&self, carrier_ghz: f64, elevation_deg: f64, observer: &Observer) -> f64;

    /// Whether this provider is backed by a live weather feed. `ntn-core`
    /// marks Prediction Records `degraded` when this is `false` (S6) —
    /// distinct from `loss_db` legitimately returning 0 dB on a clear-sky
    /// query from a real feed.
    fn is_live(&self) -> bool {
        true
    }
}

/// Always returns zero loss. Used when no weather feed is configured.
pub struct NoAtmosphericLoss;

impl AtmosphericLossProvider for NoAtmosphericLoss {
    fn loss_db(&self, _carrier_ghz: f64, _elevation_deg: f64, _observer: &Observer) -> f64 {
        0.0
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// Free-space path loss (ITU-R P.525), dB.
pub fn free_space_path_loss_db(range_km: f64, carrier_ghz: f64) -> f64 {
    32.45 + 20.0 * range_km.log10() + 20.0 * carrier_ghz.log10()
}

/// Elevation-dependent antenna gain term, a linear ramp saturating at
/// boresight (el=90 deg), following the distilled Python's
/// `min(elevation / 90.0, 1.0) * 12.0` antenna pattern approximation.
fn elevation_gain_db(elevation_deg: f64) -> f64 {
    (elevation_deg / 90.0).min(1.0).max(0.0) * 12.0
}

/// Compute RSRP in dBm for one look-angle/range sample.
pub fn rsrp_dbm(
    params: &ConstellationParams,
    range_km: f64,
    elevation_deg: f64,
    observer: &Observer,
    atmospheric_loss: &dyn AtmosphericLossProvider,
) -> Result<f64> {
    if range_km <= 0.0 {
        return Err(SignalError::InvalidInput(format!(
            "range_km must be positive, got {range_km}"
        )));
    }

    let fspl_db = free_space_path_loss_db(range_km, params.carrier_ghz);
    let l_atm_db = atmospheric_loss.loss_db(params.carrier_ghz, elevation_deg, observer);

    let raw_dbm = params.eirp_dbw + params.ground_antenna_gain_dbi + elevation_gain_db(elevation_deg)
        - fspl_db
        - l_atm_db
        - params.implementation_loss_db
        - 10.0 * params.subcarrier_count.log10()
        + 30.0; // dBW -> dBm

    if raw_dbm < RSRP_MIN_DBM || raw_dbm > RSRP_MAX_DBM {
        debug!("rsrp_dbm clamped: raw {raw_dbm:.1} dBm outside [{RSRP_MIN_DBM}, {RSRP_MAX_DBM}]");
    }
    Ok(raw_dbm.clamp(RSRP_MIN_DBM, RSRP_MAX_DBM))
}

/// Derive RSRQ from an already-computed RSRP (§4.4a, supplemental):
/// `RSRQ = RSRP - 10*log10(N_RB) - RSSI_margin_db`, clamped to
/// `[-20, -3] dB`.
pub fn rsrq_db(params: &ConstellationParams, rsrp_dbm: f64) -> f64 {
    let rsrq = rsrp_dbm - 10.0 * params.resource_block_count.log10() - params.rssi_margin_db;
    rsrq.clamp(RSRQ_MIN_DB, RSRQ_MAX_DB)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_observer() -> Observer {
        Observer {
            geodetic_latitude_deg: 0.0,
            geodetic_longitude_deg: 0.0,
            altitude_m: 0.0,
            min_elevation_deg: 10.0,
        }
    }

    #[test]
    fn rsrp_is_monotonic_in_range_at_fixed_elevation() {
        let params = ConstellationParams::for_tag(ConstellationTag::Starlink);
        let observer = fixed_observer();
        let near = rsrp_dbm(&params, 600.0, 45.0, &observer, &NoAtmosphericLoss).unwrap();
        let far = rsrp_dbm(&params, 1200.0, 45.0, &observer, &NoAtmosphericLoss).unwrap();
        assert!(near > far, "closer satellite should have higher RSRP: {near} vs {far}");
    }

    #[test]
    fn rsrp_is_monotonic_in_elevation_at_fixed_range() {
        let params = ConstellationParams::for_tag(ConstellationTag::Starlink);
        let observer = fixed_observer();
        let low = rsrp_dbm(&params, 800.0, 10.0, &observer, &NoAtmosphericLoss).unwrap();
        let high = rsrp_dbm(&params, 800.0, 80.0, &observer, &NoAtmosphericLoss).unwrap();
        assert!(high > low, "higher elevation should have higher RSRP: {high} vs {low}");
    }

    #[test]
    fn rsrp_is_clamped_to_spec_range() {
        let params = ConstellationParams::for_tag(ConstellationTag::Unknown);
        let observer = fixed_observer();
        let far = rsrp_dbm(&params, 1_000_000.0, 10.0, &observer, &NoAtmosphericLoss).unwrap();
        assert_eq!(far, RSRP_MIN_DBM);
    }

    #[test]
    fn rejects_nonpositive_range() {
        let params = ConstellationParams::for_tag(ConstellationTag::Starlink);
        let observer = fixed_observer();
        assert!(rsrp_dbm(&params, 0.0, 45.0, &observer, &NoAtmosphericLoss).is_err());
    }

    #[test]
    fn rsrq_is_clamped_to_3gpp_range() {
        let params = ConstellationParams::for_tag(ConstellationTag::Starlink);
        assert_eq!(rsrq_db(&params, -40.0), RSRQ_MAX_DB);
        assert_eq!(rsrq_db(&params, -200.0), RSRQ_MIN_DB);
    }

    struct FixedLoss(f64);
    impl AtmosphericLossProvider for FixedLoss {
        fn loss_db(&self, _carrier_ghz: f64, _elevation_deg: f64, _observer: &Observer) -> f64 {
            self.0
        }
    }

    #[test]
    fn atmospheric_loss_reduces_rsrp() {
        let params = ConstellationParams::for_tag(ConstellationTag::OneWeb);
        let observer = fixed_observer();
        let clear = rsrp_dbm(&params, 800.0, 45.0, &observer, &NoAtmosphericLoss).unwrap();
        let rainy = rsrp_dbm(&params, 800.0, 45.0, &observer, &FixedLoss(5.0)).unwrap();
        assert!(rainy <= clear);
    }

    /// S6 — degraded path, missing weather: a loss provider returning 0
    /// for every query must be indistinguishable from free-space-only
    /// propagation, within double-precision rounding.
    #[test]
    fn zero_atmospheric_loss_matches_free_space_only_within_one_hundredth_db() {
        let params = ConstellationParams::for_tag(ConstellationTag::Starlink);
        let observer = fixed_observer();
        let no_weather = rsrp_dbm(&params, 900.0, 38.0, &observer, &NoAtmosphericLoss).unwrap();
        let explicit_zero = rsrp_dbm(&params, 900.0, 38.0, &observer, &FixedLoss(0.0)).unwrap();
        assert!((no_weather - explicit_zero).abs() < 0.01, "{no_weather} vs {explicit_zero}");
    }
}
