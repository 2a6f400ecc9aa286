//! Session-level roll-up across many [`FinalScore`]s.
//!
//! One interview session produces one verdict per answer; the summary
//! condenses those into the numbers a reviewer reads first. Sentinel
//! (unevaluated) verdicts are counted but never averaged in.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{FinalScore, Grade};

/// Aggregate view of one scoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Total answers submitted, including rejected ones.
    pub answers: usize,

    /// Answers that received a real verdict.
    pub evaluated: usize,

    /// Answers the gatekeeper refused.
    pub unevaluated: usize,

    /// Verdicts produced on partial evidence.
    pub degraded: usize,

    /// Raw scores removed by the outlier filter, summed across answers.
    pub outliers_removed: usize,

    /// Mean of the evaluated verdicts. `None` when nothing was evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_score: Option<f64>,

    /// Grade band of the session mean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
}

impl SessionSummary {
    /// Roll up a batch of verdicts.
    pub fn from_scores(scores: &[FinalScore]) -> Self {
        let mut evaluated = 0usize;
        let mut unevaluated = 0usize;
        let mut degraded = 0usize;
        let mut outliers_removed = 0usize;
        let mut sum = 0.0f64;

        for score in scores {
            if score.unevaluated {
                unevaluated += 1;
                continue;
            }
            evaluated += 1;
            sum += score.value;
            outliers_removed += score.outliers_removed;
            if score.degraded {
                degraded += 1;
            }
        }

        let mean_score = (evaluated > 0).then(|| sum / evaluated as f64);

        Self {
            answers: scores.len(),
            evaluated,
            unevaluated,
            degraded,
            outliers_removed,
            mean_score,
            grade: mean_score.map(Grade::from_value),
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.mean_score, self.grade) {
            (Some(mean), Some(grade)) => write!(
                f,
                "{} answers: {} evaluated (mean {:.1}, grade {}), {} rejected, {} degraded",
                self.answers, self.evaluated, mean, grade, self.unevaluated, self.degraded
            ),
            _ => write!(
                f,
                "{} answers: none evaluated, {} rejected",
                self.answers, self.unevaluated
            ),
        }
    }
}
