//! # tribunal-core
//!
//! Deterministic ensemble score aggregation for AI-assisted interview
//! evaluation.
//!
//! This crate owns the math and the gatekeeping, answering:
//! - Is this answer worth evaluating at all?
//! - Which panel judgments count as evidence?
//! - What single score do they add up to, and how much should it be trusted?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same scores in, same verdict out
//! 2. **No LLM calls**: Collecting raw scores is the runtime crate's job
//! 3. **Never empty**: Outlier filtering cannot erase a non-empty score set
//! 4. **Honest confidence**: Spread is measured before calibration touches
//!    the mean
//!
//! ## Example
//!
//! ```rust,ignore
//! use tribunal_core::{score_collected, Answer, ScoreSet, ScoringProfile};
//!
//! let profile = ScoringProfile::from_yaml_file("profile.yaml")?;
//! let answer = Answer::text("I would add an index and re-check the plan.");
//! let verdict = score_collected(&profile, &answer, collected_scores)?;
//!
//! if verdict.unevaluated {
//!     println!("rejected: {}", verdict.rejection_reason.unwrap());
//! } else {
//!     println!("{:.1} ({})", verdict.value, verdict.grade());
//! }
//! ```

pub mod aggregator;
pub mod calibrator;
pub mod filter;
pub mod gatekeeper;
pub mod profile;
pub mod summary;
pub mod types;

// Re-export main types at crate root
pub use aggregator::{AggregateError, Aggregator};
pub use calibrator::{Calibration, Calibrator};
pub use filter::{FenceBounds, FilterOutcome, OutlierFilter, MIN_FILTER_SAMPLES};
pub use gatekeeper::{GateDecision, Gatekeeper};
pub use profile::{ProfileError, ScoringProfile};
pub use summary::SessionSummary;
pub use types::{
    Answer, Consistency, FinalScore, Grade, RawScore, ScoreSet, SCORE_MAX, SCORE_MIN,
};

/// Score an answer from already-collected raw scores.
///
/// This is the offline entry point: the oracle calls happened elsewhere (or
/// are being replayed from an audit log) and only the deterministic half of
/// the pipeline runs here. Assumes a full ensemble round was attempted.
///
/// # Arguments
///
/// * `profile` - Thresholds governing gating, filtering, and calibration
/// * `answer` - The answer the scores belong to
/// * `set` - The raw scores that arrived for it
///
/// # Returns
///
/// A [`FinalScore`], which is a sentinel when the gatekeeper rejects the
/// answer, or [`AggregateError::InsufficientEvidence`] when too few scores
/// are present to meet quorum.
pub fn score_collected(
    profile: &ScoringProfile,
    answer: &Answer,
    set: ScoreSet,
) -> Result<FinalScore, AggregateError> {
    score_collected_with_attempted(profile, answer, set, profile.ensemble_count)
}

/// Score an answer from already-collected raw scores, with an explicit
/// count of how many oracle calls were dispatched.
///
/// # Arguments
///
/// * `profile` - Thresholds governing gating, filtering, and calibration
/// * `answer` - The answer the scores belong to
/// * `set` - The raw scores that arrived for it
/// * `attempted` - How many calls were dispatched; fewer arrivals than this
///   marks the verdict degraded
pub fn score_collected_with_attempted(
    profile: &ScoringProfile,
    answer: &Answer,
    set: ScoreSet,
    attempted: usize,
) -> Result<FinalScore, AggregateError> {
    let gate = Gatekeeper::from_profile(profile);
    if let GateDecision::Rejected { reason } = gate.validate(answer) {
        return Ok(FinalScore::rejected(reason));
    }

    Aggregator::from_profile(profile).aggregate(set, attempted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn set_of(values: &[f64]) -> ScoreSet {
        ScoreSet::from_scores(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| RawScore::new(v, "test", Duration::from_millis(200), i))
                .collect(),
        )
    }

    #[test]
    fn test_full_pipeline_on_collected_scores() {
        let profile = ScoringProfile::default();
        let answer = Answer::text(
            "I would profile the query first, then add a covering index on the join column.",
        );

        let verdict = score_collected_with_attempted(
            &profile,
            &answer,
            set_of(&[10.0, 72.0, 75.0, 78.0, 80.0]),
            5,
        )
        .unwrap();

        assert_eq!(verdict.value, 76.25);
        assert_eq!(verdict.outliers_removed, 1);
        assert!(!verdict.unevaluated);
        assert!(!verdict.degraded);
    }

    #[test]
    fn test_gatekeeper_short_circuits_aggregation() {
        let profile = ScoringProfile::default();
        let verdict = score_collected(&profile, &Answer::text("ok"), ScoreSet::new()).unwrap();

        assert!(verdict.unevaluated);
        assert_eq!(verdict.value, 0.0);
        assert!(verdict
            .rejection_reason
            .as_deref()
            .unwrap()
            .contains("minimum length"));
    }

    #[test]
    fn test_quorum_failure_surfaces() {
        let profile = ScoringProfile::default();
        let answer = Answer::text("A real answer that is long enough to pass the gate.");

        let err = score_collected(&profile, &answer, ScoreSet::new()).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::InsufficientEvidence { succeeded: 0, .. }
        ));
    }

    #[test]
    fn test_explicit_attempted_marks_degraded() {
        let profile = ScoringProfile::default();
        let answer = Answer::text("A real answer that is long enough to pass the gate.");

        let verdict =
            score_collected_with_attempted(&profile, &answer, set_of(&[70.0, 74.0]), 3).unwrap();

        assert!(verdict.degraded);
        assert_eq!(verdict.value, 72.0);
    }
}
