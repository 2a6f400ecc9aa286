//! Ensemble evaluation of interview answers.
//!
//! The evaluator wires the whole pipeline together:
//! - Quality gate before any oracle spend
//! - Parallel fan-out of independent judgments via the dispatch scheduler
//! - Deterministic fan-in through tribunal-core's aggregator
//! - Optional caching of final scores

use std::sync::Arc;
use thiserror::Error;

use tribunal_core::{
    AggregateError, Aggregator, Answer, FinalScore, GateDecision, Gatekeeper, ScoringProfile,
};

use crate::cache::{CacheKey, ScoreCache};
use crate::client::EvaluatorClient;
use crate::config::RuntimeConfig;
use crate::oracle::Oracle;
use crate::prompts::TemplateId;
use crate::resilience::{CircuitBreaker, UsageReport, UsageTracker};
use crate::scheduler::DispatchScheduler;

/// Errors from ensemble evaluation.
#[derive(Error, Debug)]
pub enum EnsembleError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Oracle not configured: {0}")]
    OracleNotConfigured(String),
}

/// Scores answers by consulting a panel of independent oracle calls.
///
/// # Architecture
/// - Gate first: unanswerable input is rejected deterministically, for
///   free, before a single token is spent.
/// - Fan-out: the scheduler dispatches `ensemble_count` calls under a
///   bounded worker pool, with one retry for transient failures.
/// - Fan-in: aggregation is pure tribunal-core code. The runtime never
///   reinterprets scores; it only collects them.
/// - Missing scores degrade the verdict rather than failing it, down to
///   the profile's quorum.
pub struct EnsembleEvaluator {
    client: EvaluatorClient,
    scheduler: DispatchScheduler,
    profile: ScoringProfile,
    gatekeeper: Gatekeeper,
    aggregator: Aggregator,
    cache: Option<ScoreCache>,
}

// Manual impl: the client holds a `dyn Oracle`, which carries no `Debug` bound.
impl std::fmt::Debug for EnsembleEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleEvaluator")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl EnsembleEvaluator {
    /// Create an evaluator for an oracle backend.
    pub fn new(oracle: Arc<dyn Oracle>, profile: ScoringProfile, config: RuntimeConfig) -> Self {
        let usage = Arc::new(UsageTracker::new(config.global_token_budget));
        let client = EvaluatorClient::new(oracle, config.completion_config(), usage)
            .with_score_range(profile.score_min, profile.score_max);

        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        let scheduler = DispatchScheduler::new(config.resource_budget())
            .with_circuit_breaker(breaker)
            .with_retry_min_delay(config.retry_min_delay);

        let cache = config
            .cache_enabled
            .then(|| ScoreCache::new(config.cache_entries, config.cache_ttl));

        Self {
            client,
            scheduler,
            gatekeeper: Gatekeeper::from_profile(&profile),
            aggregator: Aggregator::from_profile(&profile),
            profile,
            cache,
        }
    }

    /// Score one answer with a full ensemble round.
    ///
    /// # Execution Flow
    /// 1. Gate the answer; rejection returns a sentinel score, not an error
    /// 2. Serve from cache when an identical scoring was already paid for
    /// 3. Fan-out: dispatch `ensemble_count` independent oracle calls
    /// 4. Fan-in: filter outliers, aggregate, calibrate (deterministic)
    /// 5. Cache and return the verdict
    pub async fn score(
        &self,
        answer: &Answer,
        template: TemplateId,
    ) -> Result<FinalScore, EnsembleError> {
        if let GateDecision::Rejected { reason } = self.gatekeeper.validate(answer) {
            tracing::info!(domain = %answer.domain, %reason, "Answer rejected before dispatch");
            return Ok(FinalScore::rejected(reason));
        }

        let key = self
            .cache
            .as_ref()
            .map(|_| CacheKey::new(answer, &self.profile, template));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key).await {
                tracing::debug!(domain = %answer.domain, "Score served from cache");
                return Ok(hit);
            }
        }

        let outcome = self
            .scheduler
            .run_ensemble(&self.client, answer, template, self.profile.ensemble_count)
            .await;

        let score = self.aggregator.aggregate(outcome.scores, outcome.attempted)?;

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, score.clone()).await;
        }

        Ok(score)
    }

    /// Score a batch of answers, preserving input order.
    ///
    /// Answers are processed in concurrency-sized groups. Gate rejections
    /// flow through as sentinel scores; a quorum failure on any answer
    /// aborts the batch, since it means the backend is effectively down.
    pub async fn score_batch(
        &self,
        answers: &[Answer],
        template: TemplateId,
    ) -> Result<Vec<FinalScore>, EnsembleError> {
        let mut results = Vec::with_capacity(answers.len());

        for batch in self.scheduler.batches(answers) {
            let scored =
                futures::future::join_all(batch.iter().map(|answer| self.score(answer, template)))
                    .await;

            for result in scored {
                results.push(result?);
            }
        }

        Ok(results)
    }

    /// Token usage so far, with remaining budget if one was set.
    pub fn usage_report(&self) -> UsageReport {
        self.client.usage().report()
    }

    /// Whether the oracle backend is reachable and credentialed.
    pub async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    /// The scoring profile this evaluator enforces.
    pub fn profile(&self) -> &ScoringProfile {
        &self.profile
    }
}

/// Builder for [`EnsembleEvaluator`].
pub struct EnsembleEvaluatorBuilder {
    oracle: Option<Arc<dyn Oracle>>,
    profile: ScoringProfile,
    config: RuntimeConfig,
}

impl EnsembleEvaluatorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            oracle: None,
            profile: ScoringProfile::default(),
            config: RuntimeConfig::default(),
        }
    }

    /// Set the oracle backend.
    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Set the scoring profile.
    pub fn profile(mut self, profile: ScoringProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the runtime configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the evaluator.
    pub fn build(self) -> Result<EnsembleEvaluator, EnsembleError> {
        let oracle = self
            .oracle
            .ok_or_else(|| EnsembleError::OracleNotConfigured("No oracle set".to_string()))?;

        Ok(EnsembleEvaluator::new(oracle, self.profile, self.config))
    }
}

impl Default for EnsembleEvaluatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{
        ChatMessage, CompletionConfig, CompletionResponse, OracleError, TokenUsage,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Oracle that counts calls and can fail the first N of them.
    struct CountingOracle {
        calls: AtomicUsize,
        fail_first: usize,
        score: f64,
    }

    impl CountingOracle {
        fn steady(score: f64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first: 0,
                score,
            })
        }

        fn failing_first(n: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first: n,
                score: 80.0,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Oracle for CountingOracle {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, OracleError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(OracleError::ApiError {
                    status: 400,
                    message: "scripted failure".to_string(),
                });
            }

            Ok(CompletionResponse {
                content: format!(r#"{{"score": {}, "rationale": "scripted"}}"#, self.score),
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

    fn evaluator_over(oracle: Arc<CountingOracle>) -> EnsembleEvaluator {
        EnsembleEvaluator::new(
            oracle,
            ScoringProfile::default(),
            RuntimeConfig::default(),
        )
    }

    fn substantive_answer() -> Answer {
        Answer::new(
            "Sharding splits the keyspace across nodes so hot keys spread out.",
            "database",
        )
    }

    #[tokio::test]
    async fn test_gate_rejection_costs_no_oracle_calls() {
        let oracle = CountingOracle::steady(80.0);
        let evaluator = evaluator_over(Arc::clone(&oracle));

        let score = evaluator
            .score(&Answer::text("ok"), TemplateId::General)
            .await
            .unwrap();

        assert!(score.unevaluated);
        assert!(score.rejection_reason.is_some());
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_full_panel_produces_final_score() {
        let oracle = CountingOracle::steady(80.0);
        let evaluator = evaluator_over(Arc::clone(&oracle));

        let score = evaluator
            .score(&substantive_answer(), TemplateId::Technical)
            .await
            .unwrap();

        assert!((score.value - 80.0).abs() < 1e-9);
        assert_eq!(score.samples, 3);
        assert!(!score.degraded);
        assert!(!score.unevaluated);
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn test_partial_panel_degrades_instead_of_failing() {
        let oracle = CountingOracle::failing_first(1);
        let evaluator = evaluator_over(Arc::clone(&oracle));

        let score = evaluator
            .score(&substantive_answer(), TemplateId::General)
            .await
            .unwrap();

        assert!(score.degraded);
        assert_eq!(score.samples, 2);
        assert!((score.value - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_single_survivor_still_scores_at_quorum_one() {
        // Two of three panel members fail outright. Quorum 1 means the one
        // judgment that arrived still becomes a verdict, flagged degraded.
        let oracle = CountingOracle::failing_first(2);
        let evaluator = evaluator_over(Arc::clone(&oracle));

        let score = evaluator
            .score(&substantive_answer(), TemplateId::General)
            .await
            .unwrap();

        assert!(score.degraded);
        assert_eq!(score.samples, 1);
        assert!((score.value - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_dead_backend_is_insufficient_evidence() {
        let oracle = CountingOracle::failing_first(usize::MAX);
        let evaluator = evaluator_over(Arc::clone(&oracle));

        let err = evaluator
            .score(&substantive_answer(), TemplateId::General)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EnsembleError::Aggregate(AggregateError::InsufficientEvidence { succeeded: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_cache_pays_for_one_round_only() {
        let oracle = CountingOracle::steady(74.0);
        let evaluator = evaluator_over(Arc::clone(&oracle));
        let answer = substantive_answer();

        let first = evaluator.score(&answer, TemplateId::Technical).await.unwrap();
        assert_eq!(oracle.calls(), 3);

        let second = evaluator.score(&answer, TemplateId::Technical).await.unwrap();
        assert_eq!(oracle.calls(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_counts() {
        let oracle = CountingOracle::steady(68.0);
        let evaluator = evaluator_over(Arc::clone(&oracle));

        let answers: Vec<Answer> = (0..5)
            .map(|i| Answer::text(format!("Answer number {i} with enough substance to pass.")))
            .collect();

        let scores = evaluator
            .score_batch(&answers, TemplateId::Behavioral)
            .await
            .unwrap();

        assert_eq!(scores.len(), 5);
        assert!(scores.iter().all(|s| !s.unevaluated));
        assert_eq!(oracle.calls(), 15);
    }

    #[tokio::test]
    async fn test_batch_carries_gate_sentinels_through() {
        let oracle = CountingOracle::steady(71.0);
        let evaluator = evaluator_over(Arc::clone(&oracle));

        let answers = vec![
            substantive_answer(),
            Answer::text("idk"),
            substantive_answer(),
        ];

        let scores = evaluator
            .score_batch(&answers, TemplateId::General)
            .await
            .unwrap();

        assert_eq!(scores.len(), 3);
        assert!(!scores[0].unevaluated);
        assert!(scores[1].unevaluated);
        assert!(!scores[2].unevaluated);
    }

    #[tokio::test]
    async fn test_builder_requires_oracle() {
        let err = EnsembleEvaluatorBuilder::new().build().unwrap_err();
        assert!(matches!(err, EnsembleError::OracleNotConfigured(_)));
    }

    #[tokio::test]
    async fn test_builder_wires_profile_and_config() {
        let oracle = CountingOracle::steady(85.0);
        let evaluator = EnsembleEvaluatorBuilder::new()
            .oracle(oracle.clone())
            .profile(ScoringProfile::thorough())
            .config(RuntimeConfig::default())
            .build()
            .unwrap();

        assert_eq!(evaluator.profile().ensemble_count, 5);

        let score = evaluator
            .score(&substantive_answer(), TemplateId::General)
            .await
            .unwrap();

        assert_eq!(score.samples, 5);
        assert_eq!(oracle.calls(), 5);
    }
}
