//! Composes C3 (geometry), C4 (signal model) and C7 (access selector)
//! into the [`handover_predictor::AccessResolver`] collaborator, so C8/C9
//! stay pure functions of an injected resolver (spec.md §9 Design Notes:
//! flatten the cyclic object graph into a one-way data flow).

use std::collections::HashMap;
use std::sync::Arc;

use access_selector::{AccessCandidate, AccessPlan, ScoredCandidate, ServiceClass};
use chrono::{DateTime, Utc};
use handover_predictor::AccessResolver;
use orbital_mechanics::{Observer, PropagatorState};
use signal_model::AtmosphericLossProvider;
use tle_loader::ConstellationTag;

use crate::api::UeConfig;

/// Resource-state telemetry the orchestrator already tracks per
/// satellite — capacity, cost and compatibility inputs that C3/C4 don't
/// produce (access-selector's own doc comment calls this out: "merging
/// C3/C4/C5 outputs with resource-state telemetry the orchestrator
/// already tracks"). A real deployment refreshes these from its resource
/// manager; this core ships sane static defaults.
#[derive(Debug, Clone, Copy)]
pub struct SatelliteResourceState {
    pub available_capacity_mbps: f64,
    pub total_capacity_mbps: f64,
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

impl Default for SatelliteResourceState {
    fn default() -> Self {
        SatelliteResourceState {
            available_capacity_mbps: 500.0,
            total_capacity_mbps: 1000.0,
            predicted_latency_ms: 50.0,
            predicted_throughput_mbps: 200.0,
            predicted_packet_loss_rate: 0.001,
            predicted_availability_s: 300.0,
            setup_time_ms: 200.0,
            signaling_overhead_kb: 4.0,
            power_consumption_mw: 700.0,
            interference_level_dbm: -95.0,
            current_load: 0.3,
            historical_load: 0.3,
        }
    }
}

/// Snapshot of tracked satellites, shared read-only state a
/// [`CoreAccessResolver`] needs to build candidates for one resolve call.
/// Plain `std::sync::RwLock`, not `tokio::sync::RwLock`: every critical
/// section here is a cheap, non-blocking `HashMap` read/insert with no
/// `.await` inside it, so there is no point paying for an async-aware
/// lock (and no risk of holding one across a suspension point).
pub struct ResolverContext {
    pub observer: Observer,
    pub propagator_states: std::sync::RwLock<HashMap<String, Arc<PropagatorState>>>,
    pub constellation_tags: std::sync::RwLock<HashMap<String, ConstellationTag>>,
    pub resource_states: std::sync::RwLock<HashMap<String, SatelliteResourceState>>,
    pub ue_configs: std::sync::RwLock<HashMap<String, UeConfig>>,
    pub atmospheric_loss: Arc<dyn AtmosphericLossProvider>,
}

pub struct CoreAccessResolver {
    pub context: Arc<ResolverContext>,
}

impl CoreAccessResolver {
    /// Build the full access plan (winner + runner-up) for `ue_id` at
    /// `time`. Exposed separately from the `AccessResolver` trait method
    /// so the orchestrator can read the runner-up for event-engine input
    /// without re-resolving.
    pub fn resolve_plan(
        &self,
        ue_id: &str,
        time: DateTime<Utc>,
    ) -> std::result::Result<AccessPlan, Box<dyn std::error::Error + Send + Sync>> {
        let ue_config = {
            let configs = self.context.ue_configs.read().expect("ue_configs lock poisoned");
            configs
                .get(ue_id)
                .cloned()
                .ok_or_else(|| format!("unknown UE: {ue_id}"))?
        };

        let propagator_states = self.context.propagator_states.read().expect("propagator_states lock poisoned");
        let constellation_tags = self.context.constellation_tags.read().expect("constellation_tags lock poisoned");
        let resource_states = self.context.resource_states.read().expect("resource_states lock poisoned");

        let mut candidates: Vec<AccessCandidate> = Vec::new();
        for (satellite_id, state) in propagator_states.iter() {
            let state_vector = match state.propagate(time) {
                Ok(sv) => sv,
                // Numerical errors (edge-of-validity-window divergence)
                // exclude the offending satellite; the core continues
                // (spec.md §7).
                Err(_) => continue,
            };

            let look = match orbital_mechanics::geometry::look_angle(&self.context.observer, &state_vector) {
                Ok(look) => look,
                Err(_) => continue,
            };
            if look.elevation_deg < self.context.observer.min_elevation_deg {
                continue;
            }

            let tag = constellation_tags.get(satellite_id).copied().unwrap_or(ConstellationTag::Unknown);
            let params = signal_model::ConstellationParams::for_tag(tag);
            let rsrp_dbm = match signal_model::rsrp_dbm(
                &params,
                look.range_km,
                look.elevation_deg,
                &self.context.observer,
                self.context.atmospheric_loss.as_ref(),
            ) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let path_loss_db = signal_model::free_space_path_loss_db(look.range_km, params.carrier_ghz);
            let resource = resource_states.get(satellite_id).copied().unwrap_or_default();

            candidates.push(AccessCandidate {
                satellite_id: satellite_id.clone(),
                rsrp_dbm,
                elevation_deg: look.elevation_deg,
                range_km: look.range_km,
                path_loss_db,
                available_capacity_mbps: resource.available_capacity_mbps,
                total_capacity_mbps: resource.total_capacity_mbps,
                required_bandwidth_mbps: ue_config.required_bandwidth_mbps,
                predicted_latency_ms: resource.predicted_latency_ms,
                predicted_throughput_mbps: resource.predicted_throughput_mbps,
                predicted_packet_loss_rate: resource.predicted_packet_loss_rate,
                predicted_availability_s: resource.predicted_availability_s,
                setup_time_ms: resource.setup_time_ms,
                signaling_overhead_kb: resource.signaling_overhead_kb,
                power_consumption_mw: resource.power_consumption_mw,
                interference_level_dbm: resource.interference_level_dbm,
                current_load: resource.current_load,
                historical_load: resource.historical_load,
            });
        }

        let config = access_selector::ScorerConfig::default();
        let service_class: ServiceClass = ue_config.service_class;
        let plan = access_selector::selector::filter_score_select(candidates, service_class, &config)?;
        Ok(plan)
    }
}

impl AccessResolver for CoreAccessResolver {
    fn resolve(
        &self,
        ue_id: &str,
        time: DateTime<Utc>,
    ) -> std::result::Result<ScoredCandidate, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.resolve_plan(ue_id, time)?.winner)
    }
}
