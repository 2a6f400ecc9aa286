//! The evaluator client: one oracle call in, one [`RawScore`] out.
//!
//! The client owns prompt assembly, the call timeout, reply parsing, and
//! range validation. It makes exactly ONE attempt per invocation; retry
//! policy belongs to the dispatch scheduler, and quorum policy to the
//! aggregator. Keeping the client retry-free means an ensemble of N never
//! silently becomes 2N calls.

use std::sync::Arc;
use std::time::Instant;

use tribunal_core::{Answer, RawScore, SCORE_MAX, SCORE_MIN};

use crate::oracle::{ChatMessage, CompletionConfig, Oracle, OracleError};
use crate::parse::parse_judgment;
use crate::prompts::{template_for, TemplateId, BASE_SYSTEM_PROMPT};
use crate::resilience::UsageTracker;

/// Stateless-per-call evaluator over one oracle backend.
///
/// Cheap to clone; clones share the oracle and the usage tracker, so every
/// concurrent panel member bills the same session.
#[derive(Clone)]
pub struct EvaluatorClient {
    oracle: Arc<dyn Oracle>,
    config: CompletionConfig,
    score_min: f64,
    score_max: f64,
    usage: Arc<UsageTracker>,
}

impl EvaluatorClient {
    /// Create a client over an oracle.
    pub fn new(oracle: Arc<dyn Oracle>, config: CompletionConfig, usage: Arc<UsageTracker>) -> Self {
        Self {
            oracle,
            config,
            score_min: SCORE_MIN,
            score_max: SCORE_MAX,
            usage,
        }
    }

    /// Override the accepted score range.
    pub fn with_score_range(mut self, min: f64, max: f64) -> Self {
        self.score_min = min;
        self.score_max = max;
        self
    }

    /// Ask the oracle to judge one answer.
    ///
    /// # Arguments
    ///
    /// * `answer` - The answer to judge.
    /// * `template` - Which rubric the panel member applies.
    /// * `call_index` - Position of this call within its ensemble round.
    ///
    /// # Returns
    ///
    /// A [`RawScore`] carrying the judgment and call latency. Fails with
    /// [`OracleError`] on network trouble, timeout, an unparseable reply,
    /// or a score outside the accepted range. One invocation is one
    /// attempt; there are no retries at this layer.
    pub async fn evaluate(
        &self,
        answer: &Answer,
        template: TemplateId,
        call_index: usize,
    ) -> Result<RawScore, OracleError> {
        let started = Instant::now();
        let messages = self.build_messages(answer, template);

        // The outer timeout drops the in-flight future on expiry; the
        // oracle's own HTTP timeout is a second line of defence.
        let response =
            match tokio::time::timeout(self.config.timeout, self.oracle.complete(messages, &self.config))
                .await
            {
                Ok(result) => result?,
                Err(_) => return Err(OracleError::Timeout(self.config.timeout)),
            };

        self.usage.record(&response.usage, &response.model);

        let judgment = parse_judgment(&response.content)
            .map_err(|e| OracleError::MalformedJudgment(e.to_string()))?;

        if judgment.score < self.score_min || judgment.score > self.score_max {
            return Err(OracleError::ScoreOutOfRange {
                value: judgment.score,
                min: self.score_min,
                max: self.score_max,
            });
        }

        tracing::debug!(
            oracle = self.oracle.name(),
            template = %template,
            call_index,
            score = judgment.score,
            latency_ms = started.elapsed().as_millis() as u64,
            "Oracle judgment received"
        );

        Ok(RawScore::new(
            judgment.score,
            judgment.rationale,
            started.elapsed(),
            call_index,
        ))
    }

    /// Assemble the prompt for one call.
    ///
    /// System prompt layout mirrors the cache structure: shared base, then
    /// the template rubric. The answer itself travels in the user message.
    fn build_messages(&self, answer: &Answer, template: TemplateId) -> Vec<ChatMessage> {
        let system = format!("{}\n{}", BASE_SYSTEM_PROMPT, template_for(template));
        let user = format!(
            "Candidate answer (domain: {}):\n\n{}\n\nScore this answer per your rubric.",
            answer.domain, answer.text
        );

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    /// Estimate the token footprint of one call, for budget checks.
    pub fn estimate_call_tokens(&self, answer: &Answer, template: TemplateId) -> u32 {
        let prompt_estimate = self
            .oracle
            .estimate_tokens(BASE_SYSTEM_PROMPT)
            .saturating_add(self.oracle.estimate_tokens(template_for(template)))
            .saturating_add(self.oracle.estimate_tokens(&answer.text));

        prompt_estimate.saturating_add(self.config.max_tokens)
    }

    /// Whether the underlying oracle reports healthy.
    pub async fn health_check(&self) -> bool {
        self.oracle.health_check().await
    }

    /// Name of the underlying oracle, for metrics and circuit keying.
    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// The usage tracker this client bills to.
    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }
}
