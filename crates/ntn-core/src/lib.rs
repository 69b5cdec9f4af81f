//! Decision Orchestrator (C10), Accuracy Tracker (C11) and Core API
//! surface (C12) for the NTN handover decision core.
//!
//! `Core` owns the TLE cache, Propagator State map and per-UE Prediction
//! Record map for the process lifetime (Design Note: replaces the
//! distilled source's process-wide singletons — see DESIGN.md).

use thiserror::Error;

pub mod accuracy_tracker;
pub mod api;
pub mod orchestrator;
pub mod resolver;
pub mod sink;

pub use accuracy_tracker::{AccuracyTracker, DeltaTAction, DeltaTRecommendation, Trend};
pub use api::{DecisionSink, Health, PredictionRecord, StaticTleSource, TleSource, UeConfig};
pub use orchestrator::{Core, UeTaskState};
pub use resolver::SatelliteResourceState;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Tle(#[from] tle_loader::TleError),
    #[error(transparent)]
    Orbital(#[from] orbital_mechanics::OrbitalError),
    #[error(transparent)]
    Signal(#[from] signal_model::SignalError),
    #[error(transparent)]
    Selector(#[from] access_selector::SelectorError),
    #[error(transparent)]
    Predictor(#[from] handover_predictor::PredictorError),
    #[error("bad configuration: {0}")]
    BadConfig(String),
    #[error("TLE fetch failed for {constellation}: {reason}")]
    TleFetchFailed { constellation: String, reason: String },
    #[error("unknown UE: {0}")]
    UnknownUe(String),
    #[error("access resolution failed: {0}")]
    ResolutionFailed(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
