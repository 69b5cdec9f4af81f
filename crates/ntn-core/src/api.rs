//! Core API surface (C12): request/response types and the three
//! collaborator traits §6 describes (`TleSource`, `AtmosphericLossProvider`
//! — re-exported from `signal-model` — and `DecisionSink`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use signal_model::AtmosphericLossProvider;

/// `health ∈ {ok, degraded, stale}` (spec.md §7): signals partial-failure
/// state to the decision sink even while predictions keep flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Degraded,
    Stale,
}

/// `{ue_id, current_serving_id, predicted_serving_id, handover_time?,
/// confidence[0..1], computed_at}` (spec.md §3). Owned by C10; replaced
/// atomically each tick, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub ue_id: String,
    pub current_serving_id: String,
    pub predicted_serving_id: String,
    pub handover_time: Option<DateTime<Utc>>,
    pub confidence: f64,
    pub computed_at: DateTime<Utc>,
    pub health: Health,
}

/// Per-UE configuration the orchestrator needs to build access candidates:
/// service class (drives `f_compat` and the overload-filter exemption) and
/// the bandwidth demand the UE requires from its serving satellite.
#[derive(Debug, Clone)]
pub struct UeConfig {
    pub ue_id: String,
    pub service_class: access_selector::ServiceClass,
    pub required_bandwidth_mbps: f64,
}

/// Injected capability: `fetch_latest(constellation) → stream<line>`
/// (spec.md §6). The core requires only UTF-8 lines and idempotent
/// re-fetch of the same epoch; no wire format beyond standard TLE.
pub trait TleSource: Send + Sync {
    fn fetch_latest(
        &self,
        constellation: &str,
    ) -> std::result::Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;
}

/// A `TleSource` that always serves a fixed, pre-loaded batch. Used by the
/// CLI when `--tle` points at a local file and by tests.
pub struct StaticTleSource {
    lines: Vec<String>,
}

impl StaticTleSource {
    pub fn new(text: &str) -> Self {
        StaticTleSource {
            lines: text.lines().map(str::to_string).collect(),
        }
    }
}

impl TleSource for StaticTleSource {
    fn fetch_latest(
        &self,
        _constellation: &str,
    ) -> std::result::Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.lines.clone())
    }
}

/// `on_prediction(Prediction Record)` / `on_event(Event Record)`
/// (spec.md §6). Non-blocking: the core never queues on a slow sink, it
/// drops to the most recent record per UE instead (enforced by the
/// orchestrator's replace-not-mutate publish, not by this trait).
pub trait DecisionSink: Send + Sync {
    fn on_prediction(&self, record: &PredictionRecord);
    fn on_event(&self, record: &event_engine::EventRecord);
}
