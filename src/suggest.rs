//! Question suggestions for partially typed input.
//!
//! Matches are case-insensitive substrings over a fixed question list,
//! capped at five, and memoised per input in a bounded TTL cache.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Inputs shorter than this many characters get no suggestions.
pub const MIN_INPUT_CHARS: usize = 3;
pub const MAX_SUGGESTIONS: usize = 5;

const CACHE_CAPACITY: usize = 1000;
const CACHE_TTL: Duration = Duration::from_secs(3600);

pub struct SuggestionIndex {
    questions: Vec<String>,
    cache: Mutex<LruCache<String, (Instant, Vec<String>)>>,
    ttl: Duration,
}

impl SuggestionIndex {
    pub fn new(questions: Vec<String>) -> Self {
        Self::with_cache(questions, CACHE_CAPACITY, CACHE_TTL)
    }

    /// A zero `capacity` is treated as one.
    pub fn with_cache(questions: Vec<String>, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            questions,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Up to five questions containing `partial`, in list order.
    pub fn suggest(&self, partial: &str) -> Vec<String> {
        if partial.chars().count() < MIN_INPUT_CHARS {
            return Vec::new();
        }

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some((at, hits)) = cache.get(partial) {
            if now.duration_since(*at) < self.ttl {
                debug!(input = %partial, "Suggestion cache hit");
                return hits.clone();
            }
        }

        let needle = partial.to_lowercase();
        let hits: Vec<String> = self
            .questions
            .iter()
            .filter(|q| q.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .cloned()
            .collect();

        cache.put(partial.to_string(), (now, hits.clone()));
        hits
    }

    /// Number of memoised inputs.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SuggestionIndex {
        SuggestionIndex::new(
            [
                "Do you encrypt data at rest?",
                "Do you encrypt data in transit?",
                "Is MFA enforced for administrators?",
                "How are encryption keys rotated?",
                "Who approves encryption exceptions?",
                "Is encryption tested annually?",
                "Are encryption ciphers reviewed?",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }

    #[test]
    fn short_input_returns_nothing() {
        let idx = index();
        assert!(idx.suggest("en").is_empty());
        assert_eq!(idx.cached_len(), 0);
    }

    #[test]
    fn matches_are_case_insensitive_substrings() {
        let idx = index();
        assert_eq!(idx.suggest("MFA"), vec!["Is MFA enforced for administrators?"]);
        assert_eq!(idx.suggest("mfa"), vec!["Is MFA enforced for administrators?"]);
    }

    #[test]
    fn at_most_five_in_list_order() {
        let idx = index();
        let hits = idx.suggest("encrypt");
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0], "Do you encrypt data at rest?");
        assert_eq!(hits[4], "Is encryption tested annually?");
    }

    #[test]
    fn results_are_memoised() {
        let idx = index();
        idx.suggest("rotat");
        idx.suggest("rotat");
        assert_eq!(idx.cached_len(), 1);
    }

    #[test]
    fn cache_is_bounded() {
        let idx = SuggestionIndex::with_cache(vec!["abcdef".to_string()], 2, CACHE_TTL);
        idx.suggest("abc");
        idx.suggest("bcd");
        idx.suggest("cde");
        assert_eq!(idx.cached_len(), 2);
    }

    #[test]
    fn least_recently_used_input_is_evicted() {
        let idx = SuggestionIndex::with_cache(vec!["abcdef".to_string()], 2, CACHE_TTL);
        idx.suggest("abc");
        idx.suggest("bcd");
        idx.suggest("abc");
        idx.suggest("cde");
        let cache = idx.cache.lock().unwrap();
        assert!(cache.contains("abc"));
        assert!(!cache.contains("bcd"));
    }

    #[test]
    fn expired_entries_are_recomputed() {
        let idx = SuggestionIndex::with_cache(vec!["abcdef".to_string()], 10, Duration::ZERO);
        assert_eq!(idx.suggest("abc"), vec!["abcdef"]);
        assert_eq!(idx.suggest("abc"), vec!["abcdef"]);
    }
}
