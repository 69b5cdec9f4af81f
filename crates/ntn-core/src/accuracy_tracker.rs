//! Accuracy Tracker (C11): rolling prediction accuracy and adaptive `Δt`
//! recommendation (spec.md §4.11).

use std::collections::VecDeque;

/// Minimum ring capacity spec.md §4.11 requires ("≥ 1000 samples").
pub const MIN_CAPACITY: usize = 1000;
pub const DELTA_T_MIN_S: f64 = 2.0;
pub const DELTA_T_MAX_S: f64 = 30.0;

const DECREASE_WINDOW: usize = 50;
const DECREASE_THRESHOLD: f64 = 0.90;
const INCREASE_WINDOW: usize = 200;
const INCREASE_THRESHOLD: f64 = 0.98;
const TREND_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Degrading,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaTAction {
    Decrease,
    Increase,
    Hold,
}

#[derive(Debug, Clone, Copy)]
pub struct DeltaTRecommendation {
    pub action: DeltaTAction,
    pub recommended_delta_t_s: f64,
}

/// Stores `(predicted_serving, actual_serving)` pairs in a bounded ring
/// (spec.md §4.11), matching the teacher's `VecDeque`-backed bounded
/// history pattern (`completed_accesses: VecDeque`, `maxlen=1000` in the
/// distilled Python).
pub struct AccuracyTracker {
    history: VecDeque<(String, String)>,
    capacity: usize,
}

impl AccuracyTracker {
    pub fn new(capacity: usize) -> Self {
        AccuracyTracker {
            history: VecDeque::with_capacity(capacity.max(MIN_CAPACITY)),
            capacity: capacity.max(MIN_CAPACITY),
        }
    }

    pub fn record(&mut self, predicted_serving: impl Into<String>, actual_serving: impl Into<String>) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((predicted_serving.into(), actual_serving.into()));
    }

    /// Current accuracy: fraction of the whole ring where predicted == actual.
    pub fn current_accuracy(&self) -> f64 {
        self.rolling_accuracy(self.history.len())
    }

    /// Accuracy over the last `window` samples (or the whole ring if fewer).
    pub fn rolling_accuracy(&self, window: usize) -> f64 {
        if self.history.is_empty() {
            return 1.0;
        }
        let n = window.min(self.history.len());
        let correct = self
            .history
            .iter()
            .rev()
            .take(n)
            .filter(|(p, a)| p == a)
            .count();
        correct as f64 / n as f64
    }

    /// Sign of the linear (least-squares) slope of per-sample correctness
    /// (1.0/0.0) over the last 100 samples (spec.md §4.11).
    pub fn trend(&self) -> Trend {
        let n = TREND_WINDOW.min(self.history.len());
        if n < 2 {
            return Trend::Flat;
        }
        let ys: Vec<f64> = self
            .history
            .iter()
            .rev()
            .take(n)
            .map(|(p, a)| if p == a { 1.0 } else { 0.0 })
            .collect();
        let ys: Vec<f64> = ys.into_iter().rev().collect();

        let n_f = n as f64;
        let mean_x = (n_f - 1.0) / 2.0;
        let mean_y = ys.iter().sum::<f64>() / n_f;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, y) in ys.iter().enumerate() {
            let dx = i as f64 - mean_x;
            numerator += dx * (y - mean_y);
            denominator += dx * dx;
        }
        if denominator == 0.0 {
            return Trend::Flat;
        }
        let slope = numerator / denominator;
        if slope > 1e-9 {
            Trend::Improving
        } else if slope < -1e-9 {
            Trend::Degrading
        } else {
            Trend::Flat
        }
    }

    /// Recommend a `Δt` adjustment from the rolling accuracy windows
    /// (spec.md §4.11: below 0.90 over the last 50 samples decreases,
    /// above 0.98 over the last 200 samples increases). A direct
    /// windowed check, not a streak of consecutive calls — the
    /// recommendation is a function of current history, not of how many
    /// times it has been asked. Recommendations are advisory only; the
    /// orchestrator decides whether to apply them.
    pub fn recommend_delta_t(&self, current_delta_t_s: f64) -> DeltaTRecommendation {
        if self.rolling_accuracy(DECREASE_WINDOW) < DECREASE_THRESHOLD {
            let recommended = (current_delta_t_s * 0.8).max(DELTA_T_MIN_S);
            return DeltaTRecommendation { action: DeltaTAction::Decrease, recommended_delta_t_s: recommended };
        }

        if self.rolling_accuracy(INCREASE_WINDOW) > INCREASE_THRESHOLD {
            let recommended = (current_delta_t_s * 1.1).min(DELTA_T_MAX_S);
            return DeltaTRecommendation { action: DeltaTAction::Increase, recommended_delta_t_s: recommended };
        }

        DeltaTRecommendation { action: DeltaTAction::Hold, recommended_delta_t_s: current_delta_t_s }
    }
}
