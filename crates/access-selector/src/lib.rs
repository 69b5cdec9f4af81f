//! Constrained Access Selector (C7)
//!
//! Scores a set of satellite access candidates for one UE and returns the
//! single highest-scoring candidate plus its runner-up, so the
//! orchestrator (C10) can fall back without re-scoring.
//!
//! # Scoring Model (6-Factor)
//!
//! ```text
//! S = w_signal·f_signal + w_capacity·f_capacity + w_perf·f_perf
//!   + w_cost·f_cost + w_compat·f_compat + w_balance·f_balance
//! ```
//!
//! | Factor      | Weight |
//! |-------------|--------|
//! | f_signal    | 0.25   |
//! | f_capacity  | 0.20   |
//! | f_perf      | 0.20   |
//! | f_cost      | 0.15   |
//! | f_compat    | 0.10   |
//! | f_balance   | 0.10   |

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod loader;
pub mod scorer;
pub mod selector;

pub use scorer::ScorerConfig;

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no candidates found")]
    NoCandidates,
    #[error("contradictory weights: sum {0} must equal 1.0 within 1e-6")]
    ContradictoryWeights(f64),
}

pub type Result<T> = std::result::Result<T, SelectorError>;

/// 3GPP-flavoured service class, each carrying its own latency/jitter/
/// reliability requirements (spec.md §4.7's `f_compat` hard requirements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceClass {
    Emergency,
    Voice,
    Video,
    Data,
    Iot,
    Background,
}

/// Per-class requirements used by `f_compat`, grounded on the distilled
/// Python's `service_configs` table.
#[derive(Debug, Clone, Copy)]
pub struct ServiceRequirements {
    pub max_latency_ms: f64,
    pub min_reliability: f64,
    pub jitter_tolerance_ms: Option<f64>,
    pub throughput_priority: bool,
}

impl ServiceClass {
    pub fn requirements(self) -> ServiceRequirements {
        match self {
            ServiceClass::Emergency => ServiceRequirements {
                max_latency_ms: 100.0,
                min_reliability: 0.999,
                jitter_tolerance_ms: None,
                throughput_priority: false,
            },
            ServiceClass::Voice => ServiceRequirements {
                max_latency_ms: 150.0,
                min_reliability: 0.98,
                jitter_tolerance_ms: Some(20.0),
                throughput_priority: false,
            },
            ServiceClass::Video => ServiceRequirements {
                max_latency_ms: 300.0,
                min_reliability: 0.95,
                jitter_tolerance_ms: None,
                throughput_priority: true,
            },
            ServiceClass::Data => ServiceRequirements {
                max_latency_ms: 1000.0,
                min_reliability: 0.90,
                jitter_tolerance_ms: None,
                throughput_priority: true,
            },
            ServiceClass::Iot => ServiceRequirements {
                max_latency_ms: 5000.0,
                min_reliability: 0.85,
                jitter_tolerance_ms: None,
                throughput_priority: false,
            },
            ServiceClass::Background => ServiceRequirements {
                max_latency_ms: 10_000.0,
                min_reliability: 0.80,
                jitter_tolerance_ms: None,
                throughput_priority: false,
            },
        }
    }

    /// Emergency class disables the overload pre-score filter (spec.md §4.7).
    pub fn exempt_from_overload_filter(self) -> bool {
        matches!(self, ServiceClass::Emergency)
    }
}

/// A satellite access candidate for one UE at one instant. Produced by
/// merging C3/C4/C5 outputs with resource-state telemetry the orchestrator
/// already tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessCandidate {
    pub satellite_id: String,
    pub rsrp_dbm: f64,
    pub elevation_deg: f64,
    pub range_km: f64,
    pub path_loss_db: f64,

    pub available_capacity_mbps: f64,
    pub total_capacity_mbps: f64,
    pub required_bandwidth_mbps: f64,

    pub predicted_latency_ms: f64,
    pub predicted_throughput_mbps: f64,
    pub predicted_packet_loss_rate: f64,
    pub predicted_availability_s: f64,

    pub setup_time_ms: f64,
    pub signaling_overhead_kb: f64,
    pub power_consumption_mw: f64,
    pub interference_level_dbm: f64,

    pub current_load: f64,
    pub historical_load: f64,
}

impl AccessCandidate {
    /// `load` used by the pre-score overload filter: active users divided
    /// by capacity, already folded into `current_load` by the caller.
    pub fn load(&self) -> f64 {
        self.current_load
    }
}

/// A scored candidate, keeping its six sub-scores for audit/debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: AccessCandidate,
    pub composite_score: f64,
    pub f_signal: f64,
    pub f_capacity: f64,
    pub f_perf: f64,
    pub f_cost: f64,
    pub f_compat: f64,
    pub f_balance: f64,
}

/// The result of one selection round: the winner plus its runner-up so
/// C10 can offer a fallback without re-scoring (spec.md §4.7), and the
/// human-readable `reasons` an audit log surfaces for the pick (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPlan {
    pub winner: ScoredCandidate,
    pub runner_up: Option<ScoredCandidate>,
    pub reasons: Vec<String>,
}
