//! IQR-based outlier filter for raw score sets.
//!
//! One wild judgment out of a small panel can swing the mean by double
//! digits. Before aggregation, scores outside the Tukey fences
//! `[Q1 - k*IQR, Q3 + k*IQR]` are dropped; the survivors carry the verdict.
//!
//! ## Key Guarantees
//!
//! - A non-empty input set never filters down to an empty one.
//! - Sets with fewer than three scores pass through untouched.
//! - Survivor order matches input order.

use serde::{Deserialize, Serialize};

use crate::types::ScoreSet;

/// Below this sample count the quartiles are meaningless and the filter is
/// a no-op.
pub const MIN_FILTER_SAMPLES: usize = 3;

/// Tukey fences computed for one filtering pass. Values on either bound are
/// retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FenceBounds {
    pub lower: f64,
    pub upper: f64,
}

impl FenceBounds {
    /// Whether a value lies within the fences, bounds included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Result of one filtering pass over a [`ScoreSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Scores that survived, in original call-index order.
    pub retained: ScoreSet,

    /// How many scores fell outside the fences.
    pub removed: usize,

    /// The fences used. `None` when the set was too small to filter.
    pub bounds: Option<FenceBounds>,
}

/// Interquartile-range outlier filter.
#[derive(Debug, Clone, Copy)]
pub struct OutlierFilter {
    /// Fence width as a multiple of the IQR. 1.5 is the standard Tukey
    /// setting.
    iqr_multiplier: f64,
}

impl OutlierFilter {
    /// Create a filter with an explicit fence multiplier.
    pub fn new(iqr_multiplier: f64) -> Self {
        Self { iqr_multiplier }
    }

    /// Filter a score set against its own Tukey fences.
    ///
    /// # Returns
    ///
    /// The surviving scores plus how many were removed. If the fences would
    /// exclude every score, the full set is retained instead: a degenerate
    /// distribution must not erase the evidence it is supposed to clean.
    pub fn apply(&self, set: &ScoreSet) -> FilterOutcome {
        if set.len() < MIN_FILTER_SAMPLES {
            return FilterOutcome {
                retained: set.clone(),
                removed: 0,
                bounds: None,
            };
        }

        let bounds = self.fences(&set.values());

        let survivors: Vec<_> = set
            .scores()
            .iter()
            .filter(|s| bounds.contains(s.value))
            .cloned()
            .collect();

        if survivors.is_empty() {
            tracing::warn!(
                samples = set.len(),
                lower = bounds.lower,
                upper = bounds.upper,
                "Outlier fences excluded every score; retaining the full set"
            );
            return FilterOutcome {
                retained: set.clone(),
                removed: 0,
                bounds: Some(bounds),
            };
        }

        let removed = set.len() - survivors.len();
        if removed > 0 {
            tracing::debug!(
                removed,
                kept = survivors.len(),
                lower = bounds.lower,
                upper = bounds.upper,
                "Outlier filter removed scores"
            );
        }

        FilterOutcome {
            retained: ScoreSet::from_scores(survivors),
            removed,
            bounds: Some(bounds),
        }
    }

    /// Compute the Tukey fences for a set of values.
    fn fences(&self, values: &[f64]) -> FenceBounds {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;

        FenceBounds {
            lower: q1 - self.iqr_multiplier * iqr,
            upper: q3 + self.iqr_multiplier * iqr,
        }
    }
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(1.5)
    }
}

/// Quantile of an already-sorted slice, by linear interpolation between the
/// two closest ranks.
///
/// For a slice of length n the rank of quantile q is `q * (n - 1)`; a
/// fractional rank interpolates between its neighbours. Matches the method
/// most statistics libraries default to.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    debug_assert!((0.0..=1.0).contains(&q));

    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;

    if lo == hi {
        sorted[lo]
    } else {
        let fraction = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * fraction
    }
}
