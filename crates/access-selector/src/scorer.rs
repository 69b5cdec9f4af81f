//! Candidate scoring implementation (C7).
//!
//! Implements the 6-factor model of spec.md §4.7:
//! `S = w_signal·f_signal + w_capacity·f_capacity + w_perf·f_perf +
//! w_cost·f_cost + w_compat·f_compat + w_balance·f_balance`.
//! Sub-score formulas are grounded on the distilled Python's
//! `FastAccessDecisionEngine._evaluate_*` methods.

use crate::{AccessCandidate, ScoredCandidate, ServiceClass};

pub const W_SIGNAL: f64 = 0.25;
pub const W_CAPACITY: f64 = 0.20;
pub const W_PERF: f64 = 0.20;
pub const W_COST: f64 = 0.15;
pub const W_COMPAT: f64 = 0.10;
pub const W_BALANCE: f64 = 0.10;

#[derive(Debug, Clone, Copy)]
pub struct ScorerConfig {
    pub w_signal: f64,
    pub w_capacity: f64,
    pub w_perf: f64,
    pub w_cost: f64,
    pub w_compat: f64,
    pub w_balance: f64,
    pub min_elevation_deg: f64,
    pub min_rsrp_dbm: f64,
    pub overload_threshold: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfig {
            w_signal: W_SIGNAL,
            w_capacity: W_CAPACITY,
            w_perf: W_PERF,
            w_cost: W_COST,
            w_compat: W_COMPAT,
            w_balance: W_BALANCE,
            min_elevation_deg: 10.0,
            min_rsrp_dbm: -120.0,
            overload_threshold: 0.85,
        }
    }
}

impl ScorerConfig {
    pub fn weight_sum(&self) -> f64 {
        self.w_signal + self.w_capacity + self.w_perf + self.w_cost + self.w_compat + self.w_balance
    }
}

/// Clamp `(x - lo) / (hi - lo)` to `[0, 1]`.
fn norm(x: f64, lo: f64, hi: f64) -> f64 {
    ((x - lo) / (hi - lo)).clamp(0.0, 1.0)
}

fn f_signal(c: &AccessCandidate) -> f64 {
    0.4 * norm(c.rsrp_dbm, -120.0, -90.0)
        + 0.3 * norm(c.elevation_deg, 10.0, 90.0)
        + 0.3 * norm(200.0 - c.path_loss_db, 0.0, 50.0)
}

fn f_capacity(c: &AccessCandidate) -> f64 {
    let available_ratio = c.available_capacity_mbps / c.total_capacity_mbps.max(1.0);
    let bandwidth_score = (available_ratio * 2.0).min(1.0);
    let user_score = (1.0 - c.current_load).max(0.0);
    let demand_score = if c.available_capacity_mbps >= c.required_bandwidth_mbps {
        1.0
    } else {
        c.available_capacity_mbps / c.required_bandwidth_mbps.max(0.1)
    };
    bandwidth_score * 0.4 + user_score * 0.3 + demand_score * 0.3
}

fn f_perf(c: &AccessCandidate, requirements: &crate::ServiceRequirements) -> f64 {
    let latency_score = if c.predicted_latency_ms <= requirements.max_latency_ms {
        norm(requirements.max_latency_ms - c.predicted_latency_ms, 0.0, requirements.max_latency_ms)
    } else {
        0.0
    };
    let throughput_score = (c.predicted_throughput_mbps / c.required_bandwidth_mbps.max(0.1)).min(1.0);
    let reliability_score = norm(
        1.0 - c.predicted_packet_loss_rate,
        0.0,
        requirements.min_reliability.max(1e-6),
    );
    let availability_score = (c.predicted_availability_s / 300.0).min(1.0);
    latency_score * 0.3 + throughput_score * 0.3 + reliability_score * 0.2 + availability_score * 0.2
}

fn f_cost(c: &AccessCandidate) -> f64 {
    let setup_score = norm(500.0 - c.setup_time_ms, 0.0, 400.0);
    let signaling_score = norm(10.0 - c.signaling_overhead_kb, 0.0, 8.0);
    let power_score = norm(1000.0 - c.power_consumption_mw, 0.0, 500.0);
    let interference_score = norm(c.interference_level_dbm + 100.0, 0.0, 20.0);
    setup_score * 0.3 + signaling_score * 0.2 + power_score * 0.2 + interference_score * 0.3
}

fn f_compat(c: &AccessCandidate, requirements: &crate::ServiceRequirements) -> f64 {
    let latency_compatibility = if c.predicted_latency_ms <= requirements.max_latency_ms {
        1.0
    } else {
        requirements.max_latency_ms / c.predicted_latency_ms
    };
    let predicted_reliability = 1.0 - c.predicted_packet_loss_rate;
    let reliability_compatibility = if predicted_reliability >= requirements.min_reliability {
        1.0
    } else {
        predicted_reliability / requirements.min_reliability
    };
    let bandwidth_compatibility = if c.predicted_throughput_mbps >= c.required_bandwidth_mbps {
        1.0
    } else {
        c.predicted_throughput_mbps / c.required_bandwidth_mbps.max(0.1)
    };
    latency_compatibility * 0.4 + reliability_compatibility * 0.3 + bandwidth_compatibility * 0.3
}

fn f_balance(c: &AccessCandidate) -> f64 {
    0.7 * (1.0 - c.current_load).max(0.0) + 0.3 * (1.0 - c.historical_load).max(0.0)
}

/// Score every candidate in `candidates` for `service_class`.
pub fn score_candidates(
    candidates: Vec<AccessCandidate>,
    service_class: ServiceClass,
    config: &ScorerConfig,
) -> Vec<ScoredCandidate> {
    let requirements = service_class.requirements();
    candidates
        .into_iter()
        .map(|c| score_candidate(c, &requirements, config))
        .collect()
}

fn score_candidate(
    candidate: AccessCandidate,
    requirements: &crate::ServiceRequirements,
    config: &ScorerConfig,
) -> ScoredCandidate {
    let f_signal = f_signal(&candidate);
    let f_capacity = f_capacity(&candidate);
    let f_perf = f_perf(&candidate, requirements);
    let f_cost = f_cost(&candidate);
    let f_compat = f_compat(&candidate, requirements);
    let f_balance = f_balance(&candidate);

    let composite_score = config.w_signal * f_signal
        + config.w_capacity * f_capacity
        + config.w_perf * f_perf
        + config.w_cost * f_cost
        + config.w_compat * f_compat
        + config.w_balance * f_balance;

    ScoredCandidate {
        candidate,
        composite_score,
        f_signal,
        f_capacity,
        f_perf,
        f_cost,
        f_compat,
        f_balance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(elevation_deg: f64, rsrp_dbm: f64, load: f64) -> AccessCandidate {
        AccessCandidate {
            satellite_id: "SAT".into(),
            rsrp_dbm,
            elevation_deg,
            range_km: 800.0,
            path_loss_db: 160.0,
            available_capacity_mbps: 500.0,
            total_capacity_mbps: 1000.0,
            required_bandwidth_mbps: 50.0,
            predicted_latency_ms: 50.0,
            predicted_throughput_mbps: 200.0,
            predicted_packet_loss_rate: 0.001,
            predicted_availability_s: 300.0,
            setup_time_ms: 200.0,
            signaling_overhead_kb: 4.0,
            power_consumption_mw: 700.0,
            interference_level_dbm: -95.0,
            current_load: load,
            historical_load: load,
        }
    }

    /// S5 — Selector ordering: load-balancing term dominates an equal-signal tie.
    #[test]
    fn load_balancing_dominates_equal_signal_tie() {
        let config = ScorerConfig::default();
        let a = candidate(60.0, -85.0, 0.80);
        let b = candidate(30.0, -85.0, 0.20);
        let scored = score_candidates(vec![a, b], ServiceClass::Data, &config);
        assert!(scored[1].composite_score > scored[0].composite_score);
    }

    #[test]
    fn weights_sum_to_one() {
        let config = ScorerConfig::default();
        assert!((config.weight_sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn higher_elevation_and_rsrp_yield_higher_signal_subscore() {
        let weak = candidate(15.0, -115.0, 0.5);
        let strong = candidate(80.0, -92.0, 0.5);
        assert!(f_signal(&strong) > f_signal(&weak));
    }
}
