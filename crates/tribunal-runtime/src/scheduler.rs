//! Dispatch scheduling for ensemble oracle calls.
//!
//! The scheduler owns the worker pool: how many oracle calls may be in
//! flight at once, when a failed call earns its single retry, and when a
//! call is skipped outright (circuit open, token budget spent). Skipped
//! and failed calls surface as missing scores; deciding whether the
//! remainder is enough evidence is the aggregator's job, never the
//! scheduler's.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::sync::Semaphore;

use tribunal_core::{Answer, RawScore, ScoreSet};

use crate::client::EvaluatorClient;
use crate::oracle::OracleError;
use crate::prompts::TemplateId;
use crate::resilience::CircuitBreaker;

/// Declared capacity of the machine running the evaluation.
///
/// Immutable once constructed: changing capacity means building a new
/// scheduler, so no ensemble round ever observes the pool resizing under
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    memory_units: u32,
}

impl ResourceBudget {
    /// Declare a budget in memory units (1 unit ~ 1 GiB).
    pub fn new(memory_units: u32) -> Self {
        Self { memory_units }
    }

    /// The declared memory units.
    pub fn memory_units(&self) -> u32 {
        self.memory_units
    }

    /// Concurrent oracle calls this budget supports.
    ///
    /// Stepped rather than linear: call slots cost far more in held
    /// buffers and connections than the step boundaries suggest, and a
    /// step function keeps behavior predictable across similar machines.
    pub fn concurrency(&self) -> usize {
        if self.memory_units >= 20 {
            16
        } else if self.memory_units >= 10 {
            8
        } else {
            4
        }
    }
}

impl Default for ResourceBudget {
    fn default() -> Self {
        // Modest worker-node footprint: 8 units, 4 concurrent calls.
        Self::new(8)
    }
}

/// Everything one ensemble round produced.
#[derive(Debug)]
pub struct EnsembleOutcome {
    /// The scores that actually arrived, in call-index order.
    pub scores: ScoreSet,

    /// How many calls were dispatched. `scores.len() < attempted` means
    /// some panel members never reported.
    pub attempted: usize,
}

/// Why a call produced no score.
enum CallFailure {
    Skipped(&'static str),
    Failed(OracleError),
}

/// Bounded-concurrency dispatcher for ensemble rounds.
///
/// # Architecture
/// - Explicit submission and join: every call is spawned as its own task,
///   then collected; a panicked or failed task costs exactly one score.
/// - A semaphore sized from the [`ResourceBudget`] bounds in-flight calls.
/// - Transient failures earn one retry with exponential backoff. One.
pub struct DispatchScheduler {
    budget: ResourceBudget,
    permits: Arc<Semaphore>,
    breaker: Arc<CircuitBreaker>,
    retry_min_delay: Duration,
}

impl DispatchScheduler {
    /// Create a scheduler for a resource budget.
    pub fn new(budget: ResourceBudget) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(budget.concurrency())),
            budget,
            breaker: Arc::new(CircuitBreaker::default()),
            retry_min_delay: Duration::from_millis(500),
        }
    }

    /// Use a shared circuit breaker instead of a private one.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    /// Override the minimum backoff delay before the retry.
    pub fn with_retry_min_delay(mut self, delay: Duration) -> Self {
        self.retry_min_delay = delay;
        self
    }

    /// The budget this scheduler was built from.
    pub fn budget(&self) -> ResourceBudget {
        self.budget
    }

    /// Maximum in-flight oracle calls.
    pub fn concurrency(&self) -> usize {
        self.budget.concurrency()
    }

    /// Split a slice of answers into concurrency-sized batches.
    pub fn batches<'a>(&self, answers: &'a [Answer]) -> std::slice::Chunks<'a, Answer> {
        answers.chunks(self.budget.concurrency())
    }

    /// Dispatch one ensemble round: `count` independent judgments of one
    /// answer.
    ///
    /// # Returns
    ///
    /// The scores that arrived plus the attempted count. This method never
    /// fails as a whole; a round where every call died returns an empty
    /// score set and leaves the verdict to quorum policy downstream.
    pub async fn run_ensemble(
        &self,
        client: &EvaluatorClient,
        answer: &Answer,
        template: TemplateId,
        count: usize,
    ) -> EnsembleOutcome {
        let mut handles = Vec::with_capacity(count);

        // Submission: one task per panel member.
        for call_index in 0..count {
            let permits = Arc::clone(&self.permits);
            let breaker = Arc::clone(&self.breaker);
            let client = client.clone();
            let answer = answer.clone();
            let retry_min_delay = self.retry_min_delay;

            handles.push(tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| CallFailure::Skipped("scheduler shut down"))?;

                if breaker.is_open(client.oracle_name()) {
                    return Err(CallFailure::Skipped("circuit open"));
                }

                let estimate = client.estimate_call_tokens(&answer, template);
                if !client.usage().can_afford(estimate) {
                    return Err(CallFailure::Skipped("token budget exhausted"));
                }

                let evaluate = || client.evaluate(&answer, template, call_index);
                let result = evaluate
                    .retry(
                        ExponentialBuilder::default()
                            .with_min_delay(retry_min_delay)
                            .with_max_times(1),
                    )
                    .when(|e: &OracleError| e.is_transient())
                    .notify(|err: &OracleError, delay: Duration| {
                        tracing::warn!(
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "Transient oracle failure, retrying once"
                        );
                    })
                    .await;

                match result {
                    Ok(score) => {
                        breaker.record_success(client.oracle_name());
                        Ok(score)
                    }
                    Err(e) => {
                        breaker.record_failure(client.oracle_name());
                        Err(CallFailure::Failed(e))
                    }
                }
            }));
        }

        // Join: a lost call is a missing score, nothing more.
        let mut scores: Vec<RawScore> = Vec::with_capacity(count);
        for handle in handles {
            match handle.await {
                Ok(Ok(score)) => scores.push(score),
                Ok(Err(CallFailure::Failed(e))) => {
                    tracing::warn!(error = %e, "Oracle call failed; score missing");
                }
                Ok(Err(CallFailure::Skipped(reason))) => {
                    tracing::warn!(reason, "Oracle call skipped; score missing");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Oracle call task panicked; score missing");
                }
            }
        }

        EnsembleOutcome {
            scores: ScoreSet::from_scores(scores),
            attempted: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{
        ChatMessage, CompletionConfig, CompletionResponse, Oracle, TokenUsage,
    };
    use crate::resilience::{CircuitBreakerConfig, UsageTracker};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Oracle whose per-call behavior is scripted by attempt number.
    struct ScriptedOracle {
        attempts: AtomicUsize,
        fail_first: usize,
        transient: bool,
    }

    impl ScriptedOracle {
        fn reliable() -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                fail_first: 0,
                transient: false,
            }
        }

        fn failing_first(n: usize, transient: bool) -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                fail_first: n,
                transient,
            }
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, OracleError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return if self.transient {
                    Err(OracleError::HttpError("connection reset".to_string()))
                } else {
                    Err(OracleError::ApiError {
                        status: 400,
                        message: "bad request".to_string(),
                    })
                };
            }

            Ok(CompletionResponse {
                content: r#"{"score": 80, "rationale": "solid"}"#.to_string(),
                usage: TokenUsage::default(),
                model: "mock".to_string(),
                stop_reason: Some("end_turn".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn client_over(oracle: Arc<ScriptedOracle>) -> EvaluatorClient {
        EvaluatorClient::new(
            oracle,
            CompletionConfig::default(),
            Arc::new(UsageTracker::unlimited()),
        )
    }

    fn answer() -> Answer {
        Answer::text("A sufficiently long answer for scheduling tests to pass the gate.")
    }

    #[test]
    fn test_concurrency_steps() {
        assert_eq!(ResourceBudget::new(4).concurrency(), 4);
        assert_eq!(ResourceBudget::new(9).concurrency(), 4);
        assert_eq!(ResourceBudget::new(10).concurrency(), 8);
        assert_eq!(ResourceBudget::new(19).concurrency(), 8);
        assert_eq!(ResourceBudget::new(20).concurrency(), 16);
        assert_eq!(ResourceBudget::new(64).concurrency(), 16);
    }

    #[test]
    fn test_batches_follow_concurrency() {
        let scheduler = DispatchScheduler::new(ResourceBudget::new(10));
        let answers: Vec<Answer> = (0..20).map(|_| answer()).collect();

        let batches: Vec<_> = scheduler.batches(&answers).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 8);
        assert_eq!(batches[2].len(), 4);
    }

    #[tokio::test]
    async fn test_full_round_collects_every_score() {
        let scheduler = DispatchScheduler::new(ResourceBudget::default());
        let client = client_over(Arc::new(ScriptedOracle::reliable()));

        let outcome = scheduler
            .run_ensemble(&client, &answer(), TemplateId::General, 3)
            .await;

        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.scores.len(), 3);

        let indices: Vec<_> = outcome.scores.scores().iter().map(|s| s.call_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_transient_failure_earns_one_retry() {
        let oracle = Arc::new(ScriptedOracle::failing_first(1, true));
        let scheduler = DispatchScheduler::new(ResourceBudget::default())
            .with_retry_min_delay(Duration::from_millis(1));
        let client = client_over(Arc::clone(&oracle));

        let outcome = scheduler
            .run_ensemble(&client, &answer(), TemplateId::General, 1)
            .await;

        // First attempt failed, retry succeeded.
        assert_eq!(outcome.scores.len(), 1);
        assert_eq!(oracle.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let oracle = Arc::new(ScriptedOracle::failing_first(1, false));
        let scheduler = DispatchScheduler::new(ResourceBudget::default())
            .with_retry_min_delay(Duration::from_millis(1));
        let client = client_over(Arc::clone(&oracle));

        let outcome = scheduler
            .run_ensemble(&client, &answer(), TemplateId::General, 1)
            .await;

        assert_eq!(outcome.scores.len(), 0);
        assert_eq!(outcome.attempted, 1);
        assert_eq!(oracle.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retry_is_missing_score_not_round_failure() {
        // Fails the first attempt and the single retry for call 0; later
        // calls succeed. The round itself still completes.
        let oracle = Arc::new(ScriptedOracle::failing_first(2, true));
        let scheduler = DispatchScheduler::new(ResourceBudget::new(4))
            .with_retry_min_delay(Duration::from_millis(1));
        let client = client_over(Arc::clone(&oracle));

        let outcome = scheduler
            .run_ensemble(&client, &answer(), TemplateId::General, 3)
            .await;

        assert_eq!(outcome.attempted, 3);
        assert!(outcome.scores.len() >= 1);
        assert!(outcome.scores.len() < 3);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_dispatch() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(3600),
            success_threshold: 1,
        }));
        breaker.record_failure("mock");

        let oracle = Arc::new(ScriptedOracle::reliable());
        let scheduler = DispatchScheduler::new(ResourceBudget::default())
            .with_circuit_breaker(breaker);
        let client = client_over(Arc::clone(&oracle));

        let outcome = scheduler
            .run_ensemble(&client, &answer(), TemplateId::General, 3)
            .await;

        assert_eq!(outcome.scores.len(), 0);
        assert_eq!(outcome.attempted, 3);
        // Not a single network call went out.
        assert_eq!(oracle.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spent_token_budget_skips_dispatch() {
        let oracle = Arc::new(ScriptedOracle::reliable());
        // Ten tokens cannot cover even one call's completion reservation.
        let client = EvaluatorClient::new(
            Arc::clone(&oracle) as Arc<dyn Oracle>,
            CompletionConfig::default(),
            Arc::new(UsageTracker::new(Some(10))),
        );
        let scheduler = DispatchScheduler::new(ResourceBudget::default());

        let outcome = scheduler
            .run_ensemble(&client, &answer(), TemplateId::General, 2)
            .await;

        assert_eq!(outcome.scores.len(), 0);
        assert_eq!(oracle.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_calls_bounded_by_budget() {
        /// Oracle that records its own peak concurrency.
        struct GaugedOracle {
            current: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl Oracle for GaugedOracle {
            async fn complete(
                &self,
                _messages: Vec<ChatMessage>,
                _config: &CompletionConfig,
            ) -> Result<CompletionResponse, OracleError> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);

                Ok(CompletionResponse {
                    content: r#"{"score": 75}"#.to_string(),
                    usage: TokenUsage::default(),
                    model: "mock".to_string(),
                    stop_reason: None,
                })
            }

            async fn health_check(&self) -> bool {
                true
            }

            fn name(&self) -> &str {
                "gauged"
            }
        }

        let oracle = Arc::new(GaugedOracle {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let client = EvaluatorClient::new(
            Arc::clone(&oracle) as Arc<dyn Oracle>,
            CompletionConfig::default(),
            Arc::new(UsageTracker::unlimited()),
        );

        // 5 memory units => 4 concurrent calls.
        let scheduler = DispatchScheduler::new(ResourceBudget::new(5));
        let outcome = scheduler
            .run_ensemble(&client, &answer(), TemplateId::General, 16)
            .await;

        assert_eq!(outcome.scores.len(), 16);
        assert!(
            oracle.peak.load(Ordering::SeqCst) <= 4,
            "peak concurrency {} exceeded the budgeted 4",
            oracle.peak.load(Ordering::SeqCst)
        );
    }
}
