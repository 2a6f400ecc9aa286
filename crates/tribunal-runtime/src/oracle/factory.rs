//! Oracle factory pattern for dynamic backend registration.
//!
//! New oracle backends register factories that create instances from
//! configuration, so adding one never means editing an enum.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = OracleRegistry::new();
//! registry.register(Arc::new(AnthropicOracleFactory));
//!
//! let oracle = registry.create("anthropic", &config)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{Oracle, OracleError};

/// Factory for creating oracles from configuration.
///
/// Each factory is responsible for:
/// 1. Validating its configuration format
/// 2. Creating oracle instances
/// 3. Providing a unique type identifier
pub trait OracleFactory: Send + Sync {
    /// Unique identifier for this oracle type, e.g. "anthropic".
    fn oracle_type(&self) -> &'static str;

    /// Create an oracle instance from JSON configuration.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn Oracle>, OracleError>;

    /// Validate configuration without creating an oracle.
    ///
    /// Use this for fast config validation during startup.
    fn validate_config(&self, config: &JsonValue) -> Result<(), OracleError>;

    /// Get default configuration for this oracle type.
    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    /// Human-readable description of this oracle type.
    fn description(&self) -> &'static str {
        "Oracle backend"
    }
}

/// Registry of available oracle factories.
#[derive(Default)]
pub struct OracleRegistry {
    factories: BTreeMap<String, Arc<dyn OracleFactory>>,
}

impl OracleRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an oracle factory.
    ///
    /// A factory with the same type replaces the existing one.
    pub fn register(&mut self, factory: Arc<dyn OracleFactory>) {
        self.factories
            .insert(factory.oracle_type().to_string(), factory);
    }

    /// Create an oracle from type name and configuration.
    pub fn create(
        &self,
        oracle_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn Oracle>, OracleError> {
        self.factories
            .get(oracle_type)
            .ok_or_else(|| {
                OracleError::NotConfigured(format!(
                    "Unknown oracle type: '{}'. Available: {:?}",
                    oracle_type,
                    self.available_types()
                ))
            })?
            .create(config)
    }

    /// Validate configuration for an oracle type.
    pub fn validate(&self, oracle_type: &str, config: &JsonValue) -> Result<(), OracleError> {
        self.factories
            .get(oracle_type)
            .ok_or_else(|| {
                OracleError::NotConfigured(format!("Unknown oracle type: '{}'", oracle_type))
            })?
            .validate_config(config)
    }

    /// List available oracle types.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Check if an oracle type is registered.
    pub fn has_oracle(&self, oracle_type: &str) -> bool {
        self.factories.contains_key(oracle_type)
    }

    /// Get default configuration for an oracle type.
    pub fn default_config(&self, oracle_type: &str) -> Option<JsonValue> {
        self.factories.get(oracle_type).map(|f| f.default_config())
    }

    /// Create a registry with all built-in oracles registered.
    #[cfg(feature = "anthropic")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::AnthropicOracleFactory));
        registry
    }

    /// Create a registry with all built-in oracles registered.
    #[cfg(not(feature = "anthropic"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OracleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleRegistry")
            .field("oracles", &self.available_types())
            .finish()
    }
}
