//! Query planner: mode → indexes → fused, hydrated results.
//!
//! | mode       | provider call | lexical | vector | pool per index        |
//! |------------|---------------|---------|--------|-----------------------|
//! | `keyword`  | no            | yes     | no     | `limit`               |
//! | `semantic` | yes           | no      | yes    | `limit`               |
//! | `hybrid`   | yes           | yes     | yes    | `max(limit * 5, 50)`  |
//!
//! The query embedding is computed before the store is touched, so the store
//! lock is never held across the provider call. Candidate ids and their text
//! are read from one snapshot.

use quarry_core::db::DocumentStore;
use quarry_core::error::RetrievalError;
use quarry_core::model::{ResultMetadata, ScoredResult, SearchMode, snippet};
use tracing::{debug, warn};

use super::scoring::fuse;
use crate::provider::EmbeddingProvider;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

const POOL_FACTOR: usize = 5;
const MIN_POOL: usize = 50;

/// Clamp a non-zero limit to `[1, MAX_LIMIT]`.
#[must_use]
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIMIT)
}

/// Candidates requested from each index for a hybrid query.
#[must_use]
pub fn candidate_pool(limit: usize) -> usize {
    limit.saturating_mul(POOL_FACTOR).max(MIN_POOL)
}

pub struct QueryPlanner<'a> {
    store: &'a DocumentStore,
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> QueryPlanner<'a> {
    #[must_use]
    pub const fn new(store: &'a DocumentStore, provider: &'a dyn EmbeddingProvider) -> Self {
        Self { store, provider }
    }

    /// Run `query` in `mode`, returning at most `limit` results.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::EmptyQuery`] for blank text (checked before anything
    /// else), [`RetrievalError::Embedding`] when the query cannot be embedded,
    /// or a storage failure.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<ScoredResult>, RetrievalError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = clamp_limit(limit);

        let embedding = if mode.needs_embedding() {
            let vector = self.provider.embed(query).map_err(|err| {
                warn!(
                    provider = self.provider.name(),
                    %mode,
                    error = %err,
                    "query embedding failed"
                );
                RetrievalError::from(err)
            })?;
            Some(vector)
        } else {
            None
        };

        let pool = match mode {
            SearchMode::Hybrid => candidate_pool(limit),
            SearchMode::Keyword | SearchMode::Semantic => limit,
        };
        let candidates = self.store.query_indexes(
            mode.needs_lexical().then_some(query),
            embedding.as_deref(),
            pool,
        )?;
        debug!(
            %mode,
            lexical = candidates.lexical.len(),
            vector = candidates.vector.len(),
            pool,
            "index candidates"
        );

        let mut results = Vec::with_capacity(limit);
        for fused in fuse(mode, &candidates.lexical, &candidates.vector) {
            if results.len() == limit {
                break;
            }
            let Some(doc) = candidates.documents.get(&fused.document_id) else {
                debug!(document_id = fused.document_id, "candidate vanished before hydration");
                continue;
            };
            results.push(ScoredResult {
                document_id: doc.id,
                title: doc.name.clone(),
                snippet: snippet(&doc.content),
                keyword_score: fused.keyword_score,
                semantic_score: fused.semantic_score,
                hybrid_score: fused.hybrid_score,
                metadata: ResultMetadata {
                    filename: doc.name.clone(),
                    content_length: doc.content_length,
                },
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HashingProvider;
    use quarry_core::error::ProviderError;
    use quarry_core::model::NewDocument;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        inner: HashingProvider,
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for Tracking {
        fn name(&self) -> &str {
            "tracking"
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }
    }

    fn seeded() -> DocumentStore {
        let store = DocumentStore::open_in_memory().expect("open store");
        let long = "machine ".repeat(60);
        for (name, content) in [
            ("ml.txt", "machine learning basics and gradient descent"),
            ("press.txt", "a history of the printing press"),
            ("long.txt", long.as_str()),
        ] {
            store
                .insert(NewDocument {
                    name: name.into(),
                    content: content.trim().into(),
                    embedding: Some(HashingProvider.embed(content).expect("embed")),
                })
                .expect("insert");
        }
        store
    }

    #[test]
    fn pool_has_a_floor_of_fifty() {
        assert_eq!(candidate_pool(1), 50);
        assert_eq!(candidate_pool(10), 50);
        assert_eq!(candidate_pool(20), 100);
        assert_eq!(candidate_pool(usize::MAX), usize::MAX);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(1), 1);
        assert_eq!(clamp_limit(500), MAX_LIMIT);
    }

    #[test]
    fn empty_query_fails_before_provider() {
        let store = seeded();
        let provider = Tracking::default();
        let planner = QueryPlanner::new(&store, &provider);

        for mode in SearchMode::ALL {
            let err = planner.search("   ", mode, 10).unwrap_err();
            assert!(matches!(err, RetrievalError::EmptyQuery));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn keyword_mode_skips_provider() {
        let store = seeded();
        let provider = Tracking::default();
        let planner = QueryPlanner::new(&store, &provider);

        let results = planner.search("machine", SearchMode::Keyword, 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(results.iter().all(|r| r.keyword_score > 0.0));
    }

    #[test]
    fn zero_limit_returns_empty_without_provider() {
        let store = seeded();
        let provider = Tracking::default();
        let planner = QueryPlanner::new(&store, &provider);

        assert!(planner.search("machine", SearchMode::Hybrid, 0).unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn snippets_and_metadata_are_filled() {
        let store = seeded();
        let planner = QueryPlanner::new(&store, &HashingProvider);

        let results = planner.search("machine", SearchMode::Keyword, 10).unwrap();
        let long = results
            .iter()
            .find(|r| r.title == "long.txt")
            .expect("long document matched");
        assert!(long.snippet.ends_with("..."));
        assert_eq!(long.snippet.chars().count(), 203);
        assert_eq!(long.metadata.filename, "long.txt");
        assert_eq!(long.metadata.content_length, 479);
    }

    #[test]
    fn hybrid_respects_limit() {
        let store = seeded();
        let planner = QueryPlanner::new(&store, &HashingProvider);
        let results = planner.search("machine", SearchMode::Hybrid, 1).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn no_candidates_is_empty_not_error() {
        let store = DocumentStore::open_in_memory().expect("open store");
        let planner = QueryPlanner::new(&store, &HashingProvider);
        for mode in SearchMode::ALL {
            assert!(planner.search("quantum", mode, 10).unwrap().is_empty());
        }
    }
}
