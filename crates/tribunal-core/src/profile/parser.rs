//! Scoring profile parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_profile_schema;
use crate::types::{SCORE_MAX, SCORE_MIN};

/// Errors that can occur when parsing scoring profiles.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Profile schema validation failed: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Profile validation failed: {0}")]
    ValidationError(String),
}

/// The scoring configuration surface.
///
/// Every knob of the aggregation pipeline lives here: ensemble width, quorum,
/// outlier sensitivity, floor correction, and gatekeeper thresholds. A
/// profile is plain data. Parse it once at startup and share it by
/// reference; nothing in the pipeline mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    /// Oracle calls per answer.
    #[serde(default = "default_ensemble_count")]
    pub ensemble_count: usize,

    /// Minimum successful calls required before aggregation may proceed.
    #[serde(default = "default_quorum")]
    pub quorum: usize,

    /// IQR whisker multiplier for outlier rejection.
    #[serde(default = "default_iqr_multiplier")]
    pub outlier_iqr_multiplier: f64,

    /// Scores below this threshold are floor-corrected.
    #[serde(default = "default_score_floor")]
    pub score_floor: f64,

    /// Amount added to sub-floor scores before flooring.
    #[serde(default = "default_score_floor_bump")]
    pub score_floor_bump: f64,

    /// Answers shorter than this (in characters, trimmed) are rejected.
    #[serde(default = "default_min_answer_length")]
    pub min_answer_length: usize,

    /// A token repeated at least this often marks a placeholder answer.
    #[serde(default = "default_placeholder_threshold")]
    pub placeholder_repeat_threshold: usize,

    /// Lower bound of the declared score range.
    #[serde(default = "default_score_min")]
    pub score_min: f64,

    /// Upper bound of the declared score range.
    #[serde(default = "default_score_max")]
    pub score_max: f64,
}

fn default_ensemble_count() -> usize {
    3
}

fn default_quorum() -> usize {
    1
}

fn default_iqr_multiplier() -> f64 {
    1.5
}

fn default_score_floor() -> f64 {
    30.0
}

fn default_score_floor_bump() -> f64 {
    15.0
}

fn default_min_answer_length() -> usize {
    20
}

fn default_placeholder_threshold() -> usize {
    5
}

fn default_score_min() -> f64 {
    SCORE_MIN
}

fn default_score_max() -> f64 {
    SCORE_MAX
}

impl Default for ScoringProfile {
    fn default() -> Self {
        Self {
            ensemble_count: default_ensemble_count(),
            quorum: default_quorum(),
            outlier_iqr_multiplier: default_iqr_multiplier(),
            score_floor: default_score_floor(),
            score_floor_bump: default_score_floor_bump(),
            min_answer_length: default_min_answer_length(),
            placeholder_repeat_threshold: default_placeholder_threshold(),
            score_min: default_score_min(),
            score_max: default_score_max(),
        }
    }
}

impl ScoringProfile {
    /// Five-call ensemble for tighter consistency at higher oracle cost.
    pub fn thorough() -> Self {
        Self {
            ensemble_count: 5,
            ..Self::default()
        }
    }

    /// Parse a profile from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ProfileError> {
        let raw: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_raw(raw)
    }

    /// Parse a profile from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Parse a profile from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a profile from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Schema-check the raw document, then deserialize and validate.
    fn from_raw(raw: serde_json::Value) -> Result<Self, ProfileError> {
        validate_profile_schema(&raw).map_err(ProfileError::SchemaViolation)?;
        let profile: ScoringProfile = serde_json::from_value(raw)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Validate cross-field constraints the schema cannot express.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.quorum > self.ensemble_count {
            return Err(ProfileError::ValidationError(format!(
                "quorum ({}) cannot exceed ensemble_count ({})",
                self.quorum, self.ensemble_count
            )));
        }

        if self.score_min >= self.score_max {
            return Err(ProfileError::ValidationError(format!(
                "score_min ({}) must be below score_max ({})",
                self.score_min, self.score_max
            )));
        }

        if self.score_floor < self.score_min || self.score_floor > self.score_max {
            return Err(ProfileError::ValidationError(format!(
                "score_floor ({}) must lie within the score range [{}, {}]",
                self.score_floor, self.score_min, self.score_max
            )));
        }

        if !self.outlier_iqr_multiplier.is_finite() || self.outlier_iqr_multiplier <= 0.0 {
            return Err(ProfileError::ValidationError(format!(
                "outlier_iqr_multiplier ({}) must be a positive finite number",
                self.outlier_iqr_multiplier
            )));
        }

        Ok(())
    }
}
