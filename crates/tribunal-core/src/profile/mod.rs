//! Scoring profile parsing and validation.
//!
//! A scoring profile is structured data validated against a JSON Schema.
//! This module handles parsing YAML/JSON profiles and validating them.

mod parser;
mod schema;

pub use parser::{ProfileError, ScoringProfile};
