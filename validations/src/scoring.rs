//! The veracity scoring function.
//!
//! A news item's veracity estimate combines three normalized signals:
//! the automated content analysis score, the stake-weighted crowd
//! position, and the reputation-weighted witness testimony. The weights
//! come from configuration and are recorded into every verdict, so any
//! historical score can be recomputed exactly.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use veridict_config::ScoringConfig;
use veridict_data_structures::{
    types::{Position, StakeTotals, VerdictOutcome, MAX_SCORE},
    witnesses::WitnessSummary,
};

/// A veracity estimate together with the confidence backing it.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Veracity {
    /// Estimated truthfulness in [0, 1]; 1 is truthful
    pub score: f64,
    /// How much evidence backs the estimate, in [0, 1]. Gates resolution;
    /// never used to break score ties.
    pub confidence: f64,
}

/// The stake-weighted crowd position: the TRUE share of all staked value.
///
/// With no stakes at all this is exactly 0.5, a neutral prior rather than
/// an error.
pub fn crowd_signal(totals: &StakeTotals) -> f64 {
    let trues = totals.true_total.drops();
    let falses = totals.false_total.drops();
    if trues == 0 && falses == 0 {
        0.5
    } else {
        trues as f64 / (trues + falses) as f64
    }
}

/// The testimony signal: neutral at 0.5, pushed toward the majority side
/// by the normalized credibility weight of that side's witnesses.
pub fn witness_signal(summary: &WitnessSummary) -> f64 {
    match summary.majority {
        Some(Position::True) => 0.5 + 0.5 * summary.weight,
        Some(Position::False) => 0.5 - 0.5 * summary.weight,
        None => 0.5,
    }
}

/// Combine the three signals into a veracity estimate.
///
/// The score is computed in deviation form, `0.5 + Σ wᵢ·(sᵢ − 0.5)`:
/// algebraically identical to the plain weighted sum for weights that sum
/// to one, but it makes the all-neutral case land on exactly 0.5, which
/// the tie fail-safe of the verdict engine depends on.
pub fn compute_veracity(
    analysis_score: u8,
    totals: &StakeTotals,
    witnesses: &WitnessSummary,
    scoring: &ScoringConfig,
) -> Veracity {
    let analysis = f64::from(analysis_score.min(MAX_SCORE)) / f64::from(MAX_SCORE);
    let crowd = crowd_signal(totals);
    let witness = witness_signal(witnesses);

    let weights = scoring.weights;
    let score = 0.5
        + weights.analysis_weight * (analysis - 0.5)
        + weights.stake_weight * (crowd - 0.5)
        + weights.witness_weight * (witness - 0.5);
    let score = score.clamp(0.0, 1.0);

    let volume = totals.total().drops() as f64 / scoring.volume_target.drops() as f64;
    let testimony = witnesses.count as f64 / f64::from(scoring.witness_target);
    let confidence = 0.5 * volume.min(1.0) + 0.5 * testimony.min(1.0);

    Veracity { score, confidence }
}

/// Map a veracity score to the side it implies. Exactly 0.5 implies
/// neither: the engine refuses to guess and resolves to `Unresolved`.
pub fn outcome_from_score(score: f64) -> VerdictOutcome {
    match score.partial_cmp(&0.5) {
        Some(Ordering::Greater) => VerdictOutcome::True,
        Some(Ordering::Less) => VerdictOutcome::False,
        // Equal, or a NaN that a clamped score cannot produce
        _ => VerdictOutcome::Unresolved,
    }
}
