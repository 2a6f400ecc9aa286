//! Quality gatekeeper: answer pre-validation before any oracle spend.
//!
//! **Question**: Is this answer worth an LLM call at all?
//!
//! Trivial, empty, and placeholder answers are refused here and receive a
//! sentinel [`FinalScore`](crate::types::FinalScore) with the rejection
//! reason recorded; no oracle call is ever scheduled for them.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::profile::ScoringProfile;
use crate::types::Answer;

lazy_static! {
    // Filler content that marks an answer as low-information outright
    static ref FILLER_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("keyboard mash", Regex::new(r"(?i)^[asdfghjkl;]{8,}$").unwrap()),
        ("lorem ipsum", Regex::new(r"(?i)\blorem\s+ipsum\b").unwrap()),
        ("test filler", Regex::new(r"(?i)^\s*(?:test|testing|asdf|qwerty|placeholder|tbd|n/a)(?:[\s.,]+(?:test|testing|asdf|qwerty|placeholder|tbd|n/a))*\s*$").unwrap()),
    ];

    static ref WORD_RE: Regex = Regex::new(r"[\p{L}\p{N}']+").unwrap();
}

/// Outcome of gatekeeping one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// The answer may be scheduled for evaluation.
    Accepted,

    /// The answer is refused; no oracle call will be spent on it.
    Rejected { reason: String },
}

impl GateDecision {
    /// Whether the answer passed the gate.
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted)
    }

    /// Rejection reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            GateDecision::Accepted => None,
            GateDecision::Rejected { reason } => Some(reason),
        }
    }
}

/// The quality gatekeeper.
///
/// Checks are deterministic and run cheapest-first: length, filler
/// patterns, dominant-repeated-token heuristic. The first failing check
/// wins and its reason is recorded verbatim on the sentinel result.
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    /// Minimum answer length in characters, after trimming.
    min_length: usize,

    /// A token repeated at least this often, dominating the answer, marks it
    /// as placeholder content.
    placeholder_repeat_threshold: usize,
}

impl Gatekeeper {
    /// Create a gatekeeper with explicit thresholds.
    pub fn new(min_length: usize, placeholder_repeat_threshold: usize) -> Self {
        Self {
            min_length,
            placeholder_repeat_threshold,
        }
    }

    /// Create a gatekeeper from a scoring profile.
    pub fn from_profile(profile: &ScoringProfile) -> Self {
        Self::new(
            profile.min_answer_length,
            profile.placeholder_repeat_threshold,
        )
    }

    /// Decide whether an answer is worth evaluating.
    pub fn validate(&self, answer: &Answer) -> GateDecision {
        let trimmed = answer.text.trim();
        let length = trimmed.chars().count();

        if length < self.min_length {
            let reason = format!(
                "answer below minimum length ({} of {} characters)",
                length, self.min_length
            );
            tracing::debug!(domain = %answer.domain, %reason, "Answer rejected by gatekeeper");
            return GateDecision::Rejected { reason };
        }

        for (pattern_name, regex) in FILLER_PATTERNS.iter() {
            if regex.is_match(trimmed) {
                let reason = format!("placeholder content detected ({})", pattern_name);
                tracing::debug!(domain = %answer.domain, %reason, "Answer rejected by gatekeeper");
                return GateDecision::Rejected { reason };
            }
        }

        if let Some(reason) = self.dominant_repetition(trimmed) {
            tracing::debug!(domain = %answer.domain, %reason, "Answer rejected by gatekeeper");
            return GateDecision::Rejected { reason };
        }

        GateDecision::Accepted
    }

    /// Detect a single token repeated often enough to dominate the answer.
    ///
    /// Both conditions must hold: the token appears at least
    /// `placeholder_repeat_threshold` times, and it accounts for at least
    /// half of all tokens. The second condition keeps ordinary prose (where
    /// "the" repeats freely) out of the net.
    fn dominant_repetition(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut total = 0usize;

        for m in WORD_RE.find_iter(&lowered) {
            *counts.entry(m.as_str()).or_insert(0) += 1;
            total += 1;
        }

        let (word, count) = counts.into_iter().max_by_key(|(_, c)| *c)?;

        if count >= self.placeholder_repeat_threshold && count * 2 >= total {
            Some(format!(
                "placeholder repetition: '{}' appears {} times in {} words",
                word, count, total
            ))
        } else {
            None
        }
    }
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::from_profile(&ScoringProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_answer_rejected() {
        let gate = Gatekeeper::default();
        let decision = gate.validate(&Answer::text("ok"));

        assert!(!decision.is_accepted());
        assert!(decision.reason().unwrap().contains("minimum length"));
    }

    #[test]
    fn test_whitespace_only_rejected() {
        let gate = Gatekeeper::default();
        let decision = gate.validate(&Answer::text("    \n\t  "));
        assert!(!decision.is_accepted());
    }

    #[test]
    fn test_substantive_answer_accepted() {
        let gate = Gatekeeper::default();
        let decision = gate.validate(&Answer::new(
            "I would start by profiling the slow query, then add an index on the join column \
             and verify the plan changed before touching application code.",
            "technical",
        ));

        assert_eq!(decision, GateDecision::Accepted);
    }

    #[test]
    fn test_repeated_placeholder_rejected() {
        let gate = Gatekeeper::default();
        // Long enough to pass the length check, but one token dominates.
        let decision = gate.validate(&Answer::text("good good good good good good answer"));

        assert!(!decision.is_accepted());
        assert!(decision.reason().unwrap().contains("repetition"));
    }

    #[test]
    fn test_normal_prose_repetition_not_flagged() {
        let gate = Gatekeeper::default();
        // "the" clears the repeat threshold but is nowhere near half the
        // tokens, so it stays ordinary prose.
        let decision = gate.validate(&Answer::text(
            "The service writes the event to the queue, the consumer reads the event, \
             and the handler updates the projection idempotently.",
        ));

        assert!(decision.is_accepted());
    }

    #[test]
    fn test_lorem_ipsum_rejected() {
        let gate = Gatekeeper::default();
        let decision = gate.validate(&Answer::text(
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit.",
        ));

        assert!(!decision.is_accepted());
        assert!(decision.reason().unwrap().contains("placeholder content"));
    }

    #[test]
    fn test_keyboard_mash_rejected() {
        let gate = Gatekeeper::default();
        let decision = gate.validate(&Answer::text("asdfasdfasdfasdfasdfasdf"));
        assert!(!decision.is_accepted());
    }

    #[test]
    fn test_threshold_boundary() {
        let gate = Gatekeeper::new(10, 5);
        // Exactly 10 characters passes.
        assert!(gate.validate(&Answer::text("abcde fghi")).is_accepted());
        // Nine characters does not.
        assert!(!gate.validate(&Answer::text("abcde fgh")).is_accepted());
    }

    #[test]
    fn test_from_profile_thresholds() {
        let mut profile = ScoringProfile::default();
        profile.min_answer_length = 5;
        let gate = Gatekeeper::from_profile(&profile);

        assert!(gate.validate(&Answer::text("short but fine")).is_accepted());
    }
}
