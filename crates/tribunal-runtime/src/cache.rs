//! Caching layer for tribunal-runtime.
//!
//! Provides in-memory caching of final scores to avoid paying for a
//! fresh ensemble when an identical answer is scored again under the
//! same profile and template.

use moka::future::Cache;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use tribunal_core::{Answer, FinalScore, ScoringProfile};

use crate::prompts::TemplateId;

/// Cache key for a scored answer.
#[derive(Clone, Debug)]
pub struct CacheKey {
    answer_hash: u64,
    profile_hash: u64,
    template: TemplateId,
}

impl CacheKey {
    /// Create a cache key from scoring inputs.
    pub fn new(answer: &Answer, profile: &ScoringProfile, template: TemplateId) -> Self {
        Self {
            answer_hash: hash_answer(answer),
            profile_hash: hash_profile(profile),
            template,
        }
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.answer_hash.hash(state);
        self.profile_hash.hash(state);
        self.template.hash(state);
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.answer_hash == other.answer_hash
            && self.profile_hash == other.profile_hash
            && self.template == other.template
    }
}

impl Eq for CacheKey {}

/// Final-score cache using moka.
pub struct ScoreCache {
    cache: Cache<CacheKey, FinalScore>,
}

impl ScoreCache {
    /// Create a new cache with the given configuration.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Get a cached score.
    pub async fn get(&self, key: &CacheKey) -> Option<FinalScore> {
        self.cache.get(key).await
    }

    /// Store a score in the cache.
    pub async fn insert(&self, key: CacheKey, score: FinalScore) {
        self.cache.insert(key, score).await;
    }

    /// Clear the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}

// Hash helpers

fn hash_answer(answer: &Answer) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    answer.text.hash(&mut hasher);
    answer.domain.hash(&mut hasher);
    hasher.finish()
}

fn hash_profile(profile: &ScoringProfile) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    // Serialized form covers every scoring knob.
    serde_json::to_string(profile)
        .unwrap_or_default()
        .hash(&mut hasher);
    hasher.finish()
}
