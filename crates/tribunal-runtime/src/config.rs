//! Runtime configuration for oracle dispatch.
//!
//! [`RuntimeConfig`] is the operator-facing half of configuration: which
//! oracle backend to call, with what model and timeouts, under which
//! resource ceilings. The scoring-policy half (panel size, quorum, fences,
//! calibration) lives in `tribunal_core::ScoringProfile` and is validated
//! separately; the two are deliberately independent files so scoring
//! policy can be versioned alongside rubrics while deployment knobs stay
//! with the deployment.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::oracle::CompletionConfig;
use crate::resilience::CircuitBreakerConfig;
use crate::scheduler::ResourceBudget;

/// Errors from loading or validating runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Operator configuration for the evaluation runtime.
///
/// Every field has a default, so an empty document is a valid
/// configuration. Durations are written in human form (`"15s"`, `"500ms"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Oracle backend to dispatch to.
    #[serde(default = "default_oracle")]
    pub oracle: String,

    /// Model identifier passed to the oracle.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per oracle reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for oracle calls.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Deadline for a single oracle call.
    #[serde(default = "default_call_timeout", with = "human_duration")]
    pub call_timeout: Duration,

    /// Minimum backoff delay before a transient failure's retry.
    #[serde(default = "default_retry_min_delay", with = "human_duration")]
    pub retry_min_delay: Duration,

    /// Declared machine capacity, in memory units.
    #[serde(default = "default_memory_units")]
    pub memory_units: u32,

    /// Enable prompt caching on backends that support it.
    #[serde(default = "default_prompt_caching")]
    pub prompt_caching: bool,

    /// Hard token ceiling for the whole session. `None` means unlimited.
    #[serde(default)]
    pub global_token_budget: Option<u32>,

    /// Circuit breaker thresholds for the oracle backend.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Keep final scores for identical inputs.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Maximum cached scores.
    #[serde(default = "default_cache_entries")]
    pub cache_entries: u64,

    /// How long a cached score stays valid.
    #[serde(default = "default_cache_ttl", with = "human_duration")]
    pub cache_ttl: Duration,
}

fn default_oracle() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.3
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_retry_min_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_memory_units() -> u32 {
    8
}

fn default_prompt_caching() -> bool {
    true
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_entries() -> u64 {
    10_000
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(3600)
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            oracle: default_oracle(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            call_timeout: default_call_timeout(),
            retry_min_delay: default_retry_min_delay(),
            memory_units: default_memory_units(),
            prompt_caching: default_prompt_caching(),
            global_token_budget: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            cache_enabled: default_cache_enabled(),
            cache_entries: default_cache_entries(),
            cache_ttl: default_cache_ttl(),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, format chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oracle.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "oracle must name a backend".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "temperature {} outside [0.0, 1.0]",
                self.temperature
            )));
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "call_timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Project the per-call completion settings.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.call_timeout,
            prompt_caching: self.prompt_caching,
        }
    }

    /// Project the declared machine capacity.
    pub fn resource_budget(&self) -> ResourceBudget {
        ResourceBudget::new(self.memory_units)
    }
}

/// Serde adapter for durations written as `"15s"` or `"500ms"`.
mod human_duration {
    use serde::{de::Error as DeError, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(DeError::custom)
    }
}
