//! Circuit breaker to prevent cascade failures.
//!
//! When calls to an oracle backend fail repeatedly, its circuit opens and
//! subsequent ensemble calls to it are skipped, surfacing as missing scores
//! rather than queued-up timeouts.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery (in seconds)
    #[serde(with = "duration_secs")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Circuit is open, all calls are skipped
    Open { opened_at: Instant },

    /// Testing if circuit can close
    HalfOpen { successes: u32 },
}

/// Circuit breaker keyed by oracle name.
///
/// Each oracle backend has its own circuit to allow independent recovery.
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Check if the circuit is open for an oracle.
    ///
    /// Returns true if calls should be skipped.
    pub fn is_open(&self, oracle: &str) -> bool {
        let states = self.states.read();
        match states.get(oracle) {
            Some(CircuitState::Open { opened_at }) => {
                // Check if recovery timeout has passed
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(oracle);
                    false
                } else {
                    true
                }
            }
            Some(CircuitState::HalfOpen { .. }) => false, // Allow test calls
            _ => false,
        }
    }

    /// Record a successful oracle call.
    pub fn record_success(&self, oracle: &str) {
        let mut states = self.states.write();
        match states.get(oracle).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(oracle.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(oracle, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        oracle.to_string(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                // Reset failures on success
                states.insert(oracle.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    /// Record a failed oracle call.
    pub fn record_failure(&self, oracle: &str) {
        let mut states = self.states.write();
        // An oracle with no recorded state has zero prior failures, so a
        // threshold of one opens on the very first failure.
        let current = states
            .get(oracle)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 });

        match current {
            CircuitState::Closed { failures } => {
                if failures + 1 >= self.config.failure_threshold {
                    states.insert(
                        oracle.to_string(),
                        CircuitState::Open {
                            opened_at: Instant::now(),
                        },
                    );
                    tracing::warn!(
                        oracle,
                        failures = failures + 1,
                        "Circuit opened after repeated failures"
                    );
                } else {
                    states.insert(
                        oracle.to_string(),
                        CircuitState::Closed {
                            failures: failures + 1,
                        },
                    );
                }
            }
            CircuitState::HalfOpen { .. } => {
                // Failed during recovery, reopen
                states.insert(
                    oracle.to_string(),
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(oracle, "Circuit reopened after failed recovery attempt");
            }
            CircuitState::Open { .. } => {}
        }
    }

    /// Transition circuit to half-open state.
    fn transition_to_half_open(&self, oracle: &str) {
        let mut states = self.states.write();
        if matches!(states.get(oracle), Some(CircuitState::Open { .. })) {
            states.insert(oracle.to_string(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(oracle, "Circuit transitioning to half-open for recovery test");
        }
    }

    /// Get current state of a circuit.
    pub fn state(&self, oracle: &str) -> CircuitState {
        self.states
            .read()
            .get(oracle)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert!(!cb.is_open("anthropic"));
    }

    #[test]
    fn test_circuit_opens_after_failures() {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        };
        let cb = CircuitBreaker::new(config);

        cb.record_failure("anthropic");
        assert!(!cb.is_open("anthropic"));

        cb.record_failure("anthropic");
        assert!(cb.is_open("anthropic"));
    }

    #[test]
    fn test_threshold_of_one_opens_immediately() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        };
        let cb = CircuitBreaker::new(config);

        cb.record_failure("anthropic");
        assert!(cb.is_open("anthropic"));
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::default();

        cb.record_failure("anthropic");
        cb.record_failure("anthropic");

        // Success should reset
        cb.record_success("anthropic");

        // Need 3 more failures to open
        cb.record_failure("anthropic");
        cb.record_failure("anthropic");
        assert!(!cb.is_open("anthropic"));
    }

    #[test]
    fn test_oracles_are_independent() {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        };
        let cb = CircuitBreaker::new(config);

        cb.record_failure("anthropic");
        cb.record_failure("anthropic");

        // Anthropic circuit is open, but the mock oracle's is closed
        assert!(cb.is_open("anthropic"));
        assert!(!cb.is_open("mock"));
    }

    #[test]
    fn test_recovery_path() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(0),
            success_threshold: 1,
        };
        let cb = CircuitBreaker::new(config);

        cb.record_failure("anthropic");
        // Zero recovery timeout: first check flips it to half-open
        assert!(!cb.is_open("anthropic"));
        assert!(matches!(
            cb.state("anthropic"),
            CircuitState::HalfOpen { .. }
        ));

        cb.record_success("anthropic");
        assert!(matches!(cb.state("anthropic"), CircuitState::Closed { .. }));
    }
}
