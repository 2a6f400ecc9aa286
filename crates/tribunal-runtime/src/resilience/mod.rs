//! Resilience primitives for oracle dispatch.
//!
//! The scheduler leans on two mechanisms here: a per-oracle circuit breaker
//! that stops hammering a failing backend, and a usage tracker that can cap
//! total token spend for a session. Neither ever fails an answer outright;
//! they convert would-be calls into missing scores and let quorum decide.

mod circuit_breaker;
mod usage;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use usage::{OracleUsage, TokenBudget, UsageReport, UsageTracker};
