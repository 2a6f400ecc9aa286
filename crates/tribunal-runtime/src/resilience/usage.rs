//! Token budget and usage accounting for oracle calls.
//!
//! Ensemble scoring multiplies every cost by N, so spend is tracked at the
//! session level. When a global budget is set and exhausted, further calls
//! are skipped and surface as missing scores.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::oracle::TokenUsage;

/// Token budget for a scoring session.
pub struct TokenBudget {
    /// Maximum tokens allowed
    pub max_tokens: u32,

    /// Currently used tokens
    used: AtomicU32,
}

impl TokenBudget {
    /// Create a new token budget.
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    /// Check if we can afford to use tokens.
    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    /// Record token usage.
    pub fn record(&self, tokens: u32) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    /// Get remaining tokens.
    pub fn remaining(&self) -> u32 {
        self.max_tokens
            .saturating_sub(self.used.load(Ordering::SeqCst))
    }

    /// Get used tokens.
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    /// Reset the budget.
    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }
}

/// Accumulated oracle usage for a scoring session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleUsage {
    /// Total tokens used
    pub total_tokens: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Number of oracle calls made
    pub oracle_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    /// Cache hits (Anthropic)
    pub cache_hits: u32,

    /// Tokens written to cache
    pub cache_creation_tokens: u32,

    /// Tokens read from cache
    pub cache_read_tokens: u32,
}

impl OracleUsage {
    /// Add token usage from an oracle response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.oracle_calls += 1;
        self.cache_creation_tokens += usage.cache_creation_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;

        if usage.cache_read_tokens > 0 {
            self.cache_hits += 1;
        }

        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    /// Estimate cost for a usage entry.
    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // Pricing per million tokens (as of Dec 2025)
        let (input_rate, output_rate, cache_write_rate, cache_read_rate) = match model {
            m if m.contains("sonnet-4-5") => (3.0, 15.0, 3.75, 0.3),
            m if m.contains("opus-4-5") => (5.0, 25.0, 6.25, 0.5),
            m if m.contains("haiku-4-5") => (1.0, 5.0, 1.25, 0.1),
            _ => (3.0, 15.0, 3.75, 0.3), // Default to Sonnet pricing
        };

        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;
        let cache_write_cost =
            (usage.cache_creation_tokens as f64 / 1_000_000.0) * cache_write_rate;
        let cache_read_cost = (usage.cache_read_tokens as f64 / 1_000_000.0) * cache_read_rate;

        input_cost + output_cost + cache_write_cost + cache_read_cost
    }
}

/// Point-in-time view of a session's spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    /// Accumulated usage
    pub usage: OracleUsage,

    /// Remaining global budget, if one is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_remaining: Option<u32>,

    /// When tracking started
    pub since: DateTime<Utc>,
}

/// Usage tracker for an entire scoring session.
///
/// Shared across all evaluator clients in the session via `Arc`.
pub struct UsageTracker {
    /// Optional session-wide token cap
    global_budget: Option<TokenBudget>,

    /// Accumulated usage
    usage: RwLock<OracleUsage>,

    /// When this tracker was created
    started_at: DateTime<Utc>,
}

impl UsageTracker {
    /// Create a tracker, optionally capped at a global token budget.
    pub fn new(global_max_tokens: Option<u32>) -> Self {
        Self {
            global_budget: global_max_tokens.map(TokenBudget::new),
            usage: RwLock::new(OracleUsage::default()),
            started_at: Utc::now(),
        }
    }

    /// Create an uncapped tracker.
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Check if the session can afford an estimated call.
    ///
    /// Always true when no budget is set.
    pub fn can_afford(&self, estimated_tokens: u32) -> bool {
        self.global_budget
            .as_ref()
            .map(|b| b.can_afford(estimated_tokens))
            .unwrap_or(true)
    }

    /// Record usage after a call.
    pub fn record(&self, usage: &TokenUsage, model: &str) {
        if let Some(budget) = &self.global_budget {
            budget.record(usage.total());
        }
        self.usage.write().add(usage, model);
    }

    /// Snapshot current usage.
    pub fn report(&self) -> UsageReport {
        UsageReport {
            usage: self.usage.read().clone(),
            tokens_remaining: self.global_budget.as_ref().map(|b| b.remaining()),
            since: self.started_at,
        }
    }

    /// Reset accumulated usage and budget.
    pub fn reset(&self) {
        if let Some(budget) = &self.global_budget {
            budget.reset();
        }
        *self.usage.write() = OracleUsage::default();
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::unlimited()
    }
}
