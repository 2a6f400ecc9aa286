//! JSON Schema validation for scoring profiles.
//!
//! Profiles are validated against schema/profile.schema.json before typed
//! deserialization, so unknown fields and out-of-range values are caught
//! with field-level messages instead of silently defaulting.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded profile schema (loaded at compile time).
const PROFILE_SCHEMA_JSON: &str = include_str!("../../../../schema/profile.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema validation.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

/// Get or initialize the compiled schema validator.
fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(PROFILE_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate a raw profile document against the schema.
///
/// # Returns
///
/// * `Ok(())` - Profile is valid
/// * `Err(Vec<String>)` - List of validation errors with JSON pointers
pub fn validate_profile_schema(profile_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(profile_json)
        .map(|error| format!("{} at {}", error, error.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
