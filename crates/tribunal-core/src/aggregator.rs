//! Ensemble aggregation: many raw judgments in, one [`FinalScore`] out.
//!
//! The pipeline is fixed: quorum check, outlier filter, mean and population
//! standard deviation over the survivors, then floor calibration of the
//! mean. The standard deviation is always taken before calibration so that
//! confidence reflects what the panel actually said.

use chrono::Utc;
use thiserror::Error;

use crate::calibrator::Calibrator;
use crate::filter::OutlierFilter;
use crate::profile::ScoringProfile;
use crate::types::{FinalScore, ScoreSet};

/// Errors that end aggregation for a single answer.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Fewer oracle calls succeeded than the quorum demands. There is no
    /// defensible score to emit, so none is.
    #[error("insufficient evidence: {succeeded} of {quorum} required scores present")]
    InsufficientEvidence { succeeded: usize, quorum: usize },
}

/// Turns a [`ScoreSet`] into a [`FinalScore`] under one scoring profile.
#[derive(Debug, Clone)]
pub struct Aggregator {
    filter: OutlierFilter,
    calibrator: Calibrator,
    quorum: usize,
}

impl Aggregator {
    /// Create an aggregator from a scoring profile.
    pub fn from_profile(profile: &ScoringProfile) -> Self {
        Self {
            filter: OutlierFilter::new(profile.outlier_iqr_multiplier),
            calibrator: Calibrator::from_profile(profile),
            quorum: profile.quorum,
        }
    }

    /// Aggregate the raw scores collected for one answer.
    ///
    /// # Arguments
    ///
    /// * `set` - The raw scores that actually arrived.
    /// * `attempted` - How many oracle calls were dispatched for the answer.
    ///
    /// # Returns
    ///
    /// The final verdict, or [`AggregateError::InsufficientEvidence`] when
    /// fewer scores arrived than the quorum requires. A successful verdict
    /// with `set.len() < attempted` is marked degraded; it met quorum, but
    /// on thinner evidence than requested.
    pub fn aggregate(
        &self,
        set: ScoreSet,
        attempted: usize,
    ) -> Result<FinalScore, AggregateError> {
        let succeeded = set.len();
        if succeeded < self.quorum {
            return Err(AggregateError::InsufficientEvidence {
                succeeded,
                quorum: self.quorum,
            });
        }

        let degraded = succeeded < attempted;
        if degraded {
            tracing::warn!(
                succeeded,
                attempted,
                "Scoring on partial evidence; verdict will be marked degraded"
            );
        }

        let outcome = self.filter.apply(&set);
        let survivors = outcome.retained.values();

        // Quorum plus the filter's non-empty guarantee make this safe.
        let mean = mean(&survivors);
        let std_dev = population_std_dev(&survivors, mean);

        let calibration = self.calibrator.calibrate(mean);

        Ok(FinalScore {
            value: calibration.value,
            std_dev,
            outliers_removed: outcome.removed,
            floor_applied: calibration.floor_applied,
            unevaluated: false,
            degraded,
            samples: survivors.len(),
            rejection_reason: None,
            evaluated_at: Utc::now(),
        })
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::from_profile(&ScoringProfile::default())
    }
}

/// Arithmetic mean. Callers guarantee a non-empty slice.
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around a known mean.
fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}
