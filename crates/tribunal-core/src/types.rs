//! Core data model for ensemble answer scoring.
//!
//! Everything here is plain data: answers go in, raw per-call scores
//! accumulate into a [`ScoreSet`], and aggregation produces exactly one
//! immutable [`FinalScore`] per answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lower bound of the declared score range.
pub const SCORE_MIN: f64 = 0.0;

/// Upper bound of the declared score range.
pub const SCORE_MAX: f64 = 100.0;

/// A candidate's free-text response to one interview question.
///
/// Immutable once submitted for evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// The response text.
    pub text: String,

    /// Question/domain tag (e.g., "technical", "behavioral").
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    "general".to_string()
}

impl Answer {
    /// Create an answer with an explicit domain tag.
    pub fn new(text: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            domain: domain.into(),
        }
    }

    /// Create an answer with the default "general" domain tag.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            domain: default_domain(),
        }
    }
}

/// One oracle call's judgment for one [`Answer`].
///
/// Created by the evaluator client and never mutated afterwards. RawScores
/// are retained for audit even when the outlier filter excludes them from
/// aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    /// Numeric judgment within the declared score range.
    pub value: f64,

    /// Free-text rationale returned by the oracle.
    pub rationale: String,

    /// Wall-clock latency of the call that produced this score.
    #[serde(with = "duration_ms")]
    pub latency: Duration,

    /// Position of this call within its ensemble round (0-based).
    pub call_index: usize,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl RawScore {
    /// Create a raw score.
    pub fn new(
        value: f64,
        rationale: impl Into<String>,
        latency: Duration,
        call_index: usize,
    ) -> Self {
        Self {
            value,
            rationale: rationale.into(),
            latency,
            call_index,
        }
    }
}

/// Ordered collection of [`RawScore`]s produced for a single answer within
/// one ensemble round.
///
/// Order follows call index, not completion order. The set is owned by the
/// aggregation path for the duration of one request and discarded once the
/// [`FinalScore`] exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    scores: Vec<RawScore>,
}

impl ScoreSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set from already-collected scores, ordered by call index.
    pub fn from_scores(mut scores: Vec<RawScore>) -> Self {
        scores.sort_by_key(|s| s.call_index);
        Self { scores }
    }

    /// Append a score.
    pub fn push(&mut self, score: RawScore) {
        self.scores.push(score);
    }

    /// Number of scores in the set.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The raw scores, in call-index order.
    pub fn scores(&self) -> &[RawScore] {
        &self.scores
    }

    /// Just the numeric values, in call-index order.
    pub fn values(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.value).collect()
    }

    /// Consume the set, yielding its scores.
    pub fn into_scores(self) -> Vec<RawScore> {
        self.scores
    }
}

/// The calibrated, outlier-filtered verdict for one [`Answer`].
///
/// Created once per answer; immutable after creation. When `unevaluated` is
/// true the answer never reached the oracle and `value` is a sentinel 0.0;
/// consumers must check the flag before trusting the number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    /// Calibrated mean of the surviving scores.
    pub value: f64,

    /// Population standard deviation of the surviving scores, taken before
    /// calibration. Lower means the panel agreed.
    pub std_dev: f64,

    /// How many raw scores the outlier filter removed.
    pub outliers_removed: usize,

    /// Whether the score floor raised the value.
    pub floor_applied: bool,

    /// The gatekeeper rejected the answer; no oracle call was spent on it.
    pub unevaluated: bool,

    /// Quorum was met but fewer calls succeeded than were requested.
    pub degraded: bool,

    /// Surviving sample count the value was computed from.
    pub samples: usize,

    /// Gatekeeper reason, present when `unevaluated` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub rejection_reason: Option<String>,

    /// When the verdict was produced.
    pub evaluated_at: DateTime<Utc>,
}

impl FinalScore {
    /// Sentinel result for an answer the gatekeeper refused to evaluate.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            value: 0.0,
            std_dev: 0.0,
            outliers_removed: 0,
            floor_applied: false,
            unevaluated: true,
            degraded: false,
            samples: 0,
            rejection_reason: Some(reason.into()),
            evaluated_at: Utc::now(),
        }
    }

    /// Letter grade for this score. Meaningless when `unevaluated` is true.
    pub fn grade(&self) -> Grade {
        Grade::from_value(self.value)
    }

    /// How tightly the panel agreed on this answer.
    pub fn consistency(&self) -> Consistency {
        Consistency::from_std_dev(self.std_dev)
    }
}

/// Letter grade bands over the 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
}

impl Grade {
    /// Band a numeric value: A+ >= 90, A >= 80, B >= 70, C >= 60, else D.
    pub fn from_value(value: f64) -> Self {
        if value >= 90.0 {
            Grade::APlus
        } else if value >= 80.0 {
            Grade::A
        } else if value >= 70.0 {
            Grade::B
        } else if value >= 60.0 {
            Grade::C
        } else {
            Grade::D
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::APlus => write!(f, "A+"),
            Grade::A => write!(f, "A"),
            Grade::B => write!(f, "B"),
            Grade::C => write!(f, "C"),
            Grade::D => write!(f, "D"),
        }
    }
}

/// Panel agreement level, derived from the standard deviation of the
/// surviving score set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    /// std_dev < 3: the panel effectively agreed.
    High,
    /// std_dev < 7: normal spread.
    Medium,
    /// std_dev < 12: notable disagreement, worth a second look.
    Low,
    /// std_dev >= 12: panel disagreement is itself the signal.
    Unstable,
}

impl Consistency {
    /// Band a standard deviation into an agreement level.
    pub fn from_std_dev(std_dev: f64) -> Self {
        if std_dev < 3.0 {
            Consistency::High
        } else if std_dev < 7.0 {
            Consistency::Medium
        } else if std_dev < 12.0 {
            Consistency::Low
        } else {
            Consistency::Unstable
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consistency::High => write!(f, "high"),
            Consistency::Medium => write!(f, "medium"),
            Consistency::Low => write!(f, "low"),
            Consistency::Unstable => write!(f, "unstable"),
        }
    }
}
