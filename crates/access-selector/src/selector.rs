//! Pre-score filtering and final selection (C7).

use crate::scorer::ScorerConfig;
use crate::{AccessCandidate, AccessPlan, ScoredCandidate, SelectorError, ServiceClass};
use tracing::debug;

/// Drop candidates below `min_elevation_deg`, below `min_rsrp`, or above
/// `overload_threshold` load — except for the emergency class, which
/// disables the overload predicate (spec.md §4.7).
pub fn filter_candidates(
    candidates: Vec<AccessCandidate>,
    service_class: ServiceClass,
    config: &ScorerConfig,
) -> Vec<AccessCandidate> {
    let exempt = service_class.exempt_from_overload_filter();
    let before = candidates.len();

    let filtered: Vec<AccessCandidate> = candidates
        .into_iter()
        .filter(|c| {
            c.elevation_deg >= config.min_elevation_deg
                && c.rsrp_dbm >= config.min_rsrp_dbm
                && (exempt || c.load() <= config.overload_threshold)
        })
        .collect();

    debug!(
        "pre-score filter kept {}/{} candidates (service_class exempt_overload={exempt})",
        filtered.len(),
        before
    );
    filtered
}

/// Select the winner and runner-up from already-scored candidates,
/// breaking ties on equal composite score by higher elevation then lower
/// range (spec.md §4.7).
pub fn select(mut scored: Vec<ScoredCandidate>) -> crate::Result<AccessPlan> {
    if scored.is_empty() {
        return Err(SelectorError::NoCandidates);
    }

    scored.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.candidate
                    .elevation_deg
                    .partial_cmp(&a.candidate.elevation_deg)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                a.candidate
                    .range_km
                    .partial_cmp(&b.candidate.range_km)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    let candidate_count = scored.len();
    let mut iter = scored.into_iter();
    let winner = iter.next().expect("checked non-empty above");
    let runner_up = iter.next();

    let reasons = build_reasons(&winner, runner_up.as_ref(), candidate_count);

    Ok(AccessPlan { winner, runner_up, reasons })
}

/// Human-readable justification for an audit log: the winning score
/// among how many candidates, its dominant weighted sub-factor, and the
/// tie-break margin against the runner-up when scores are close.
fn build_reasons(winner: &ScoredCandidate, runner_up: Option<&ScoredCandidate>, candidate_count: usize) -> Vec<String> {
    let mut reasons = vec![format!(
        "{} selected with composite score {:.3} among {candidate_count} candidate(s)",
        winner.candidate.satellite_id, winner.composite_score
    )];

    let factors = [
        ("signal", winner.f_signal),
        ("capacity", winner.f_capacity),
        ("performance", winner.f_perf),
        ("cost", winner.f_cost),
        ("compatibility", winner.f_compat),
        ("load balance", winner.f_balance),
    ];
    if let Some((name, value)) = factors
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    {
        reasons.push(format!("dominant factor: {name} ({value:.3})"));
    }

    if let Some(runner_up) = runner_up {
        let margin = winner.composite_score - runner_up.composite_score;
        reasons.push(format!(
            "runner-up {} trailed by {margin:.3}",
            runner_up.candidate.satellite_id
        ));
    } else {
        reasons.push("no runner-up survived filtering".to_string());
    }

    reasons
}

/// Filter, score and select in one call — the shape `ntn-core`'s
/// orchestrator actually invokes per tick.
pub fn filter_score_select(
    candidates: Vec<AccessCandidate>,
    service_class: ServiceClass,
    config: &ScorerConfig,
) -> crate::Result<AccessPlan> {
    let filtered = filter_candidates(candidates, service_class, config);
    let scored = crate::scorer::score_candidates(filtered, service_class, config);
    select(scored)
}
