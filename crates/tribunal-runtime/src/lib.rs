//! # tribunal-runtime
//!
//! Oracle dispatch for ensemble answer scoring.
//!
//! `tribunal-core` answers *what is the verdict, given these scores*;
//! this crate answers *how do the scores get here*. It owns everything
//! that touches a network or a clock: oracle backends, prompt templates,
//! reply parsing, the bounded worker pool, retries, circuit breaking,
//! token budgets, and the score cache.
//!
//! ## Key Guarantees
//!
//! 1. **One network boundary**: all oracle traffic flows through the
//!    [`Oracle`] trait. Nothing else in the workspace performs IO.
//! 2. **Failures are missing scores**: a timed-out, rate-limited, or
//!    garbled call costs the panel one vote. Whether the remaining votes
//!    suffice is quorum policy in `tribunal-core`, never a crash here.
//! 3. **Bounded spend**: concurrency is capped by the declared resource
//!    budget, retries are capped at one, and an optional global token
//!    budget stops dispatch entirely once spent.
//! 4. **Nothing is scored twice**: identical answer, profile, and
//!    template hit the cache instead of the oracle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tribunal_core::{Answer, ScoringProfile};
//! use tribunal_runtime::{
//!     AnthropicOracle, EnsembleEvaluatorBuilder, RuntimeConfig, TemplateId,
//! };
//!
//! let oracle = Arc::new(AnthropicOracle::from_env()?);
//! let evaluator = EnsembleEvaluatorBuilder::new()
//!     .oracle(oracle)
//!     .profile(ScoringProfile::default())
//!     .config(RuntimeConfig::default())
//!     .build()?;
//!
//! let answer = Answer::new("Consistent hashing limits rebalancing...", "database");
//! let score = evaluator.score(&answer, TemplateId::Technical).await?;
//! println!("{:.1} ({})", score.value, score.grade());
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod ensemble;
pub mod oracle;
pub mod parse;
pub mod prompts;
pub mod resilience;
pub mod scheduler;

pub use cache::{CacheKey, ScoreCache};
pub use client::EvaluatorClient;
pub use config::{ConfigError, RuntimeConfig};
pub use ensemble::{EnsembleError, EnsembleEvaluator, EnsembleEvaluatorBuilder};
pub use oracle::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, CredentialSource, Oracle,
    OracleError, OracleFactory, OracleRegistry, TokenUsage,
};
pub use parse::{parse_judgment, JudgmentParseError, ParsedJudgment};
pub use prompts::{template_for, TemplateId, BASE_SYSTEM_PROMPT};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, OracleUsage, TokenBudget, UsageReport,
    UsageTracker,
};
pub use scheduler::{DispatchScheduler, EnsembleOutcome, ResourceBudget};

#[cfg(feature = "anthropic")]
pub use oracle::{AnthropicOracle, AnthropicOracleFactory};
