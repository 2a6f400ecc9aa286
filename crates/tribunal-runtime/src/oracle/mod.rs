//! Oracle abstractions for tribunal-runtime.
//!
//! An oracle is an LLM endpoint asked to judge one answer. This module
//! defines the trait oracles implement, the error taxonomy for failed
//! calls, and the Anthropic implementation.
//!
//! ## Security
//!
//! All oracles use the [`secrets`] module for credential handling. See
//! [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use factory::{OracleFactory, OracleRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicOracle, AnthropicOracleFactory};

/// Errors from oracle calls.
///
/// Every variant counts as one failed call for quorum purposes. Transient
/// variants are eligible for a single retry; the rest fail immediately.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("No usable score in oracle reply: {0}")]
    MalformedJudgment(String),

    #[error("Score {value} outside declared range [{min}, {max}]")]
    ScoreOutOfRange { value: f64, min: f64, max: f64 },

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Oracle not configured: {0}")]
    NotConfigured(String),
}

impl OracleError {
    /// Whether a retry of the same call could plausibly succeed.
    ///
    /// Network trouble, rate limits, timeouts, and server-side errors are
    /// transient. A reply the oracle already committed to (bad score, parse
    /// failure) or a configuration problem is not.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::HttpError(_) => true,
            OracleError::RateLimited { .. } => true,
            OracleError::Timeout(_) => true,
            OracleError::ApiError { status, .. } => *status >= 500,
            OracleError::ParseError(_) => false,
            OracleError::MalformedJudgment(_) => false,
            OracleError::ScoreOutOfRange { .. } => false,
            OracleError::AuthError => false,
            OracleError::NotConfigured(_) => false,
        }
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature. Kept above zero so ensemble members sample
    /// independently instead of echoing one judgment N times.
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Enable prompt caching (Anthropic-specific)
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250514".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            timeout: Duration::from_secs(15),
            prompt_caching: true,
        }
    }
}

/// A chat message for oracle completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Response from an oracle completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,

    /// Stop reason
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,

    /// Tokens read from cache (Anthropic)
    pub cache_read_tokens: u32,

    /// Tokens written to cache (Anthropic)
    pub cache_creation_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Oracle abstraction allows swapping LLM backends.
///
/// # Boundary Constraint
/// This is the ONLY place where network calls are made. Aggregation in
/// tribunal-core NEVER sees this trait; it only sees the scores that came
/// back.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, OracleError>;

    /// Check if the oracle is healthy.
    async fn health_check(&self) -> bool;

    /// Get oracle name for metrics.
    fn name(&self) -> &str;

    /// Estimate tokens for a prompt.
    fn estimate_tokens(&self, text: &str) -> u32 {
        // Simple estimate: ~4 chars per token
        (text.len() / 4) as u32
    }
}
