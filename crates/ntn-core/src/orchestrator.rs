//! Decision Orchestrator (C10): one cooperative `tokio` task per UE,
//! driven by the configured `Δt` (spec.md §4.10). `run_tick` is a plain
//! async function so it is unit-testable without a real timer loop;
//! `run_forever` is the thin `tokio::time` wrapper around it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use handover_predictor::AccessResolver;
use orbital_mechanics::{Observer, PropagatorState};
use signal_model::AtmosphericLossProvider;
use tle_loader::ConstellationTag;
use tracing::{debug, info, warn};

use crate::accuracy_tracker::AccuracyTracker;
use crate::api::{DecisionSink, Health, PredictionRecord, UeConfig};
use crate::resolver::{CoreAccessResolver, ResolverContext, SatelliteResourceState};
use crate::{CoreError, Result};

/// Process-lifetime owner of the TLE cache, Propagator State map and
/// per-UE Prediction Record map (spec.md §4.12's Design Note).
pub struct Core {
    context: Arc<ResolverContext>,
    prediction_cache: tokio::sync::RwLock<HashMap<String, Arc<PredictionRecord>>>,
    sink: Arc<dyn DecisionSink>,
    dropped_ticks: AtomicU64,
}

impl Core {
    pub fn new(observer: Observer, atmospheric_loss: Arc<dyn AtmosphericLossProvider>, sink: Arc<dyn DecisionSink>) -> Self {
        let context = Arc::new(ResolverContext {
            observer,
            propagator_states: std::sync::RwLock::new(HashMap::new()),
            constellation_tags: std::sync::RwLock::new(HashMap::new()),
            resource_states: std::sync::RwLock::new(HashMap::new()),
            ue_configs: std::sync::RwLock::new(HashMap::new()),
            atmospheric_loss,
        });
        Core {
            context,
            prediction_cache: tokio::sync::RwLock::new(HashMap::new()),
            sink,
            dropped_ticks: AtomicU64::new(0),
        }
    }

    pub fn observer(&self) -> Observer {
        self.context.observer
    }

    pub fn dropped_tick_count(&self) -> u64 {
        self.dropped_ticks.load(Ordering::Relaxed)
    }

    /// Parse a TLE batch and copy-on-write swap the Propagator State map
    /// (spec.md §5: "built once per TLE refresh, read-only afterwards").
    /// Satellites whose elements fail to build SGP4 constants are logged
    /// and excluded, never fatal to the batch.
    pub async fn refresh_tle(&self, tle_text: &str) -> Result<tle_loader::LoadReport> {
        let (records, report) = tle_loader::load_str(tle_text)?;

        let mut states = HashMap::with_capacity(records.len());
        let mut tags = HashMap::with_capacity(records.len());
        for record in &records {
            match PropagatorState::build(record) {
                Ok(state) => {
                    tags.insert(record.satellite_id.clone(), record.constellation_tag);
                    states.insert(record.satellite_id.clone(), Arc::new(state));
                }
                Err(e) => warn!("dropping satellite {} from refresh: {e}", record.satellite_id),
            }
        }

        info!("TLE refresh: {} satellites now tracked", states.len());
        *self.context.propagator_states.write().expect("propagator_states lock poisoned") = states;
        *self.context.constellation_tags.write().expect("constellation_tags lock poisoned") = tags;
        Ok(report)
    }

    pub async fn register_ue(&self, config: UeConfig) {
        self.context
            .ue_configs
            .write()
            .expect("ue_configs lock poisoned")
            .insert(config.ue_id.clone(), config);
    }

    pub async fn set_resource_state(&self, satellite_id: impl Into<String>, state: SatelliteResourceState) {
        self.context
            .resource_states
            .write()
            .expect("resource_states lock poisoned")
            .insert(satellite_id.into(), state);
    }

    pub fn access_resolver(self: &Arc<Self>) -> Arc<dyn AccessResolver> {
        Arc::new(CoreAccessResolver { context: self.context.clone() })
    }

    pub async fn latest_prediction(&self, ue_id: &str) -> Option<Arc<PredictionRecord>> {
        self.prediction_cache.read().await.get(ue_id).cloned()
    }

    /// One orchestrator tick for one UE (spec.md §4.10, steps 1-5):
    /// resolve the access plan, drain C6 events, run C8/C9, publish a
    /// new Prediction Record, and feed the prior tick's outcome to the
    /// Accuracy Tracker once its `T_p` has elapsed.
    pub async fn run_tick(
        self: &Arc<Self>,
        resolver: &Arc<dyn AccessResolver>,
        state: &mut UeTaskState,
        now: DateTime<Utc>,
    ) -> Result<PredictionRecord> {
        let core_resolver = CoreAccessResolver { context: self.context.clone() };
        let ue_id = state.ue_id.clone();

        let plan = core_resolver
            .resolve_plan(&ue_id, now)
            .map_err(|e| CoreError::ResolutionFailed(e.to_string()))?;

        let mut degraded = plan.runner_up.is_none() || !self.context.atmospheric_loss.is_live();

        if let Some(runner_up) = &plan.runner_up {
            let serving_tag = self.tag_for(&plan.winner.candidate.satellite_id);
            let candidate_tag = self.tag_for(&runner_up.candidate.satellite_id);
            let serving_measurement = event_engine::Measurement {
                rsrp_dbm: Some(plan.winner.candidate.rsrp_dbm),
                rsrq_dbm: Some(signal_model::rsrq_db(
                    &signal_model::ConstellationParams::for_tag(serving_tag),
                    plan.winner.candidate.rsrp_dbm,
                )),
                range_km: Some(plan.winner.candidate.range_km),
                elevation_deg: plan.winner.candidate.elevation_deg,
            };
            let candidate_measurement = event_engine::Measurement {
                rsrp_dbm: Some(runner_up.candidate.rsrp_dbm),
                rsrq_dbm: Some(signal_model::rsrq_db(
                    &signal_model::ConstellationParams::for_tag(candidate_tag),
                    runner_up.candidate.rsrp_dbm,
                )),
                range_km: Some(runner_up.candidate.range_km),
                elevation_deg: runner_up.candidate.elevation_deg,
            };

            let (events, diagnostics) = state.event_engine.evaluate_tick(
                &plan.winner.candidate.satellite_id,
                &runner_up.candidate.satellite_id,
                now,
                serving_measurement,
                candidate_measurement,
                &state.event_config,
            );
            for event in &events {
                self.sink.on_event(event);
            }
            if !diagnostics.is_empty() {
                debug!("{} event measurement(s) unavailable this tick", diagnostics.len());
            }
        }

        let prediction = handover_predictor::two_point_prediction(
            resolver.clone(),
            &ue_id,
            now,
            state.delta_t_s.round() as i64,
        )
        .await?;

        let handover_time = if prediction.handover_required {
            let future_time = now + chrono::Duration::seconds(state.delta_t_s.round() as i64);
            match handover_predictor::binary_search_refinement(
                resolver.clone(),
                &ue_id,
                now,
                future_time,
                handover_predictor::DEFAULT_EPSILON_S,
                handover_predictor::DEFAULT_MAX_ITERATIONS,
            )
            .await
            {
                Ok(outcome) => {
                    degraded = degraded || outcome.low_confidence;
                    Some(outcome.handover_time)
                }
                Err(handover_predictor::PredictorError::NoCrossing) => None,
                Err(e) => return Err(CoreError::Predictor(e)),
            }
        } else {
            None
        };

        let health = if degraded { Health::Degraded } else { Health::Ok };
        let record = PredictionRecord {
            ue_id: ue_id.clone(),
            current_serving_id: plan.winner.candidate.satellite_id.clone(),
            predicted_serving_id: prediction.serving_future.candidate.satellite_id.clone(),
            handover_time,
            confidence: prediction.confidence,
            computed_at: now,
            health,
        };

        self.prediction_cache.write().await.insert(ue_id.clone(), Arc::new(record.clone()));
        self.sink.on_prediction(&record);

        if let Some(prior) = &state.prior_prediction {
            if prior.handover_time.map_or(false, |t| now >= t) {
                state.accuracy_tracker.record(
                    prior.predicted_serving_id.clone(),
                    plan.winner.candidate.satellite_id.clone(),
                );
                let recommendation = state.accuracy_tracker.recommend_delta_t(state.delta_t_s);
                if recommendation.action != crate::accuracy_tracker::DeltaTAction::Hold {
                    info!(
                        "UE {ue_id}: adapting delta_t {:.1}s -> {:.1}s ({:?})",
                        state.delta_t_s, recommendation.recommended_delta_t_s, recommendation.action
                    );
                    state.delta_t_s = recommendation.recommended_delta_t_s;
                }
            }
        }
        state.prior_prediction = Some(Arc::new(record.clone()));

        Ok(record)
    }

    fn tag_for(&self, satellite_id: &str) -> ConstellationTag {
        self.context
            .constellation_tags
            .read()
            .expect("constellation_tags lock poisoned")
            .get(satellite_id)
            .copied()
            .unwrap_or(ConstellationTag::Unknown)
    }

    fn note_dropped_tick(&self, ue_id: &str, overrun: Duration) {
        let total = self.dropped_ticks.fetch_add(1, Ordering::Relaxed) + 1;
        warn!("UE {ue_id}: tick overran by {overrun:?}, dropping rather than queueing ({total} dropped so far)");
    }

    /// Run `run_tick` forever at the (adaptive) `Δt` cadence, one
    /// `tokio::task` per UE (spec.md §4.10, §5). Ticks that overrun their
    /// own `Δt` are dropped, not queued — predictions are idempotent so a
    /// missed tick self-heals on the next one (spec.md §5 back-pressure
    /// policy).
    pub async fn run_forever(self: Arc<Self>, resolver: Arc<dyn AccessResolver>, mut state: UeTaskState) {
        loop {
            let tick_start = tokio::time::Instant::now();
            let now = Utc::now();
            let budget = Duration::from_secs_f64(state.delta_t_s);

            let ue_id = state.ue_id.clone();
            match self.run_tick(&resolver, &mut state, now).await {
                Ok(_) => {}
                Err(e) => warn!("UE {ue_id}: tick failed: {e}"),
            }

            let elapsed = tick_start.elapsed();
            if elapsed >= budget {
                self.note_dropped_tick(&ue_id, elapsed - budget);
                continue;
            }
            tokio::time::sleep(budget - elapsed).await;
        }
    }
}

/// Per-UE orchestrator state, owned exclusively by that UE's task —
/// never shared (spec.md §5: "Event Engine state: owned by its
/// orchestrator task, not shared").
pub struct UeTaskState {
    pub ue_id: String,
    pub delta_t_s: f64,
    pub event_engine: event_engine::EventEngine,
    pub event_config: event_engine::EventConfig,
    pub accuracy_tracker: AccuracyTracker,
    pub prior_prediction: Option<Arc<PredictionRecord>>,
}

impl UeTaskState {
    pub fn new(ue_id: impl Into<String>, delta_t_s: f64) -> Self {
        UeTaskState {
            ue_id: ue_id.into(),
            delta_t_s,
            event_engine: event_engine::EventEngine::new(),
            event_config: event_engine::EventConfig::default(),
            accuracy_tracker: AccuracyTracker::new(crate::accuracy_tracker::MIN_CAPACITY),
            prior_prediction: None,
        }
    }
}
