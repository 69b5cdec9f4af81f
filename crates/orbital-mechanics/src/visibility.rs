//! Visibility Window Finder (C5).
//!
//! Scans a [`TimeSeries`] and emits `[t_rise, t_set]` intervals where
//! elevation crosses `min_elevation_deg`. Windows shorter than 5
//! consecutive samples are discarded (spec.md §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::LookAngle;
use crate::{Observer, PropagatorState, Result};

const MIN_WINDOW_SAMPLES: usize = 5;

/// One instant of a satellite's Time-Series (spec.md §3). Immutable once
/// emitted; `rsrp_dbm`/`rsrq_dbm` are filled in by the Signal Model (C4)
/// and left `None` here since orbital-mechanics has no link-budget model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplePoint {
    pub time_offset_s: i64,
    pub position_eci_km: [f64; 3],
    pub velocity_eci_km_s: [f64; 3],
    pub look_angle: LookAngle,
    pub is_visible: bool,
    pub doppler_hz: f64,
    pub rsrp_dbm: Option<f64>,
    pub rsrq_dbm: Option<f64>,
}

/// Ordered Sample Points for one satellite over one base epoch, at a
/// fixed step. Restartable: recomputable from TLE + base epoch + step +
/// length, so it is never serialized as the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub satellite_id: String,
    pub base_epoch: DateTime<Utc>,
    pub step_s: i64,
    pub samples: Vec<SamplePoint>,
}

impl TimeSeries {
    /// Generate `length` samples spaced `step_s` apart starting at
    /// `base_epoch`, using `carrier_hz` for the Doppler calculation.
    /// Propagation failures (outside the ±72h validity window) abort the
    /// whole series rather than silently truncating it, since a caller
    /// expects a time-series with a well-defined epoch/length contract.
    pub fn generate(
        state: &PropagatorState,
        observer: &Observer,
        base_epoch: DateTime<Utc>,
        step_s: i64,
        length: usize,
        carrier_hz: f64,
    ) -> Result<Self> {
        let mut samples = Vec::with_capacity(length);
        for i in 0..length {
            let offset = step_s * i as i64;
            let t = base_epoch + chrono::Duration::seconds(offset);
            let sv = state.propagate(t)?;
            let look_angle = crate::geometry::look_angle(observer, &sv)?;
            let doppler_hz = crate::geometry::doppler_hz(observer, &sv, carrier_hz)?;
            let is_visible = look_angle.elevation_deg >= observer.min_elevation_deg;

            samples.push(SamplePoint {
                time_offset_s: offset,
                position_eci_km: sv.position_eci_km,
                velocity_eci_km_s: sv.velocity_eci_km_s,
                look_angle,
                is_visible,
                doppler_hz,
                rsrp_dbm: None,
                rsrq_dbm: None,
            });
        }

        Ok(TimeSeries {
            satellite_id: state.satellite_id.clone(),
            base_epoch,
            step_s,
            samples,
        })
    }
}

/// A contiguous visibility segment above `min_elevation_deg`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisibilityWindow {
    pub t_rise_offset_s: i64,
    pub t_set_offset_s: i64,
    pub peak_elevation_deg: f64,
    pub mean_rsrp_dbm: Option<f64>,
}

/// Scan `series` for visibility windows, discarding any shorter than
/// [`MIN_WINDOW_SAMPLES`] consecutive samples.
pub fn find_visibility_windows(series: &TimeSeries) -> Vec<VisibilityWindow> {
    let mut windows = Vec::new();
    let mut run_start: Option<usize> = None;

    let mut flush = |start: usize, end: usize, windows: &mut Vec<VisibilityWindow>| {
        let run = &series.samples[start..=end];
        if run.len() < MIN_WINDOW_SAMPLES {
            return;
        }
        let peak_elevation_deg = run
            .iter()
            .map(|s| s.look_angle.elevation_deg)
            .fold(f64::MIN, f64::max);
        let rsrp_values: Vec<f64> = run.iter().filter_map(|s| s.rsrp_dbm).collect();
        let mean_rsrp_dbm = if rsrp_values.is_empty() {
            None
        } else {
            Some(rsrp_values.iter().sum::<f64>() / rsrp_values.len() as f64)
        };
        windows.push(VisibilityWindow {
            t_rise_offset_s: run[0].time_offset_s,
            t_set_offset_s: run[run.len() - 1].time_offset_s,
            peak_elevation_deg,
            mean_rsrp_dbm,
        });
    };

    for (i, sample) in series.samples.iter().enumerate() {
        match (sample.is_visible, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                flush(start, i - 1, &mut windows);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        flush(start, series.samples.len() - 1, &mut windows);
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LookAngle;

    fn sample(offset: i64, elevation_deg: f64, is_visible: bool) -> SamplePoint {
        SamplePoint {
            time_offset_s: offset,
            position_eci_km: [0.0; 3],
            velocity_eci_km_s: [0.0; 3],
            look_angle: LookAngle {
                elevation_deg,
                azimuth_deg: 0.0,
                range_km: 1000.0,
            },
            is_visible,
            doppler_hz: 0.0,
            rsrp_dbm: Some(-100.0),
            rsrq_dbm: None,
        }
    }

    fn series_from(visible_flags: &[bool]) -> TimeSeries {
        let samples = visible_flags
            .iter()
            .enumerate()
            .map(|(i, &v)| sample(i as i64 * 30, if v { 15.0 } else { 2.0 }, v))
            .collect();
        TimeSeries {
            satellite_id: "TEST".into(),
            base_epoch: Utc::now(),
            step_s: 30,
            samples,
        }
    }

    #[test]
    fn short_runs_are_discarded() {
        let series = series_from(&[false, true, true, false]);
        assert!(find_visibility_windows(&series).is_empty());
    }

    #[test]
    fn runs_of_at_least_five_are_kept() {
        let series = series_from(&[false, true, true, true, true, true, false]);
        let windows = find_visibility_windows(&series);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].t_rise_offset_s, 30);
        assert_eq!(windows[0].t_set_offset_s, 150);
        assert_eq!(windows[0].peak_elevation_deg, 15.0);
    }

    #[test]
    fn trailing_visible_run_is_flushed_at_series_end() {
        let series = series_from(&[false, true, true, true, true, true]);
        let windows = find_visibility_windows(&series);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].t_set_offset_s, 150);
    }

    #[test]
    fn multiple_disjoint_windows_are_all_found() {
        let mut flags = vec![false; 2];
        flags.extend(vec![true; 5]);
        flags.extend(vec![false; 3]);
        flags.extend(vec![true; 6]);
        let series = series_from(&flags);
        let windows = find_visibility_windows(&series);
        assert_eq!(windows.len(), 2);
    }
}
