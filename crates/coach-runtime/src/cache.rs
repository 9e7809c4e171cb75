//! Caching layer for coach-runtime.
//!
//! When enabled, repeated submissions of the same answer to the same
//! question are served from memory instead of calling the model again.
//! The cache is off by default. Only successful
//! evaluations are stored; parse failures and upstream errors are not.

use coach_core::{EvaluationRequest, EvaluationResult};
use moka::future::Cache;

use crate::config::CacheConfig;

/// Evaluation cache using moka, keyed on the full request.
#[derive(Clone)]
pub struct EvaluationCache {
    cache: Cache<EvaluationRequest, EvaluationResult>,
}

impl EvaluationCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();

        Self { cache }
    }

    /// Build a cache if the configuration enables one.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config))
    }

    pub async fn get(&self, request: &EvaluationRequest) -> Option<EvaluationResult> {
        self.cache.get(request).await
    }

    pub async fn insert(&self, request: EvaluationRequest, evaluation: EvaluationResult) {
        self.cache.insert(request, evaluation).await;
    }

    /// Approximate number of entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl std::fmt::Debug for EvaluationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationCache")
            .field("entries", &self.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cache_operations() {
        let cache = EvaluationCache::new(&CacheConfig::default());
        let key = EvaluationRequest::new("Java", "What is OOP?", "Objects").unwrap();

        assert!(cache.get(&key).await.is_none());

        let evaluation = EvaluationResult {
            score: Some(6.0),
            feedback: "Partial".to_string(),
            ..Default::default()
        };
        cache.insert(key.clone(), evaluation.clone()).await;

        assert_eq!(cache.get(&key).await, Some(evaluation));

        let other = EvaluationRequest::new("Java", "What is OOP?", "Classes").unwrap();
        assert!(cache.get(&other).await.is_none());
    }

    #[test]
    fn test_cache_is_opt_in() {
        assert!(EvaluationCache::from_config(&CacheConfig::default()).is_none());

        let config = CacheConfig {
            enabled: true,
            max_entries: 10,
            ttl: Duration::from_secs(1),
        };
        assert!(EvaluationCache::from_config(&config).is_some());
    }
}
