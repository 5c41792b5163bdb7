//! Linear score fusion.
//!
//! ```text
//! hybrid_score = 0.5 * keyword_score + 0.5 * semantic_score
//! ```
//!
//! - `keyword_score` is the lexical (BM25) score, `0.0` when the document
//!   did not match lexically.
//! - `semantic_score` is the cosine similarity clamped to `[0, 1]`, `0.0`
//!   when the document has no vector hit.
//! - Results sort by the mode's score descending, then document id
//!   ascending.
//!
//! Single-signal modes reuse that signal verbatim as `hybrid_score` and pin
//! the other signal to `0.0`.

use quarry_core::db::fts::LexicalHit;
use quarry_core::db::vector::VectorHit;
use quarry_core::model::{DocumentId, SearchMode};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const KEYWORD_WEIGHT: f64 = 0.5;
pub const SEMANTIC_WEIGHT: f64 = 0.5;

/// Per-document score breakdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedScore {
    pub document_id: DocumentId,
    pub keyword_score: f64,
    pub semantic_score: f64,
    pub hybrid_score: f64,
}

impl FusedScore {
    /// The score this mode ranks by.
    #[must_use]
    pub const fn rank_score(&self, mode: SearchMode) -> f64 {
        match mode {
            SearchMode::Keyword => self.keyword_score,
            SearchMode::Semantic => self.semantic_score,
            SearchMode::Hybrid => self.hybrid_score,
        }
    }
}

#[must_use]
pub fn hybrid_score(keyword_score: f64, semantic_score: f64) -> f64 {
    KEYWORD_WEIGHT * keyword_score + SEMANTIC_WEIGHT * semantic_score
}

/// Fuse raw index hits for `mode` into a sorted list.
///
/// Hits from an index the mode does not use are ignored. The output is the
/// union of the remaining candidates, uncapped.
#[must_use]
pub fn fuse(mode: SearchMode, lexical: &[LexicalHit], vector: &[VectorHit]) -> Vec<FusedScore> {
    let mut signals: BTreeMap<DocumentId, (f64, f64)> = BTreeMap::new();

    if mode.needs_lexical() {
        for hit in lexical {
            signals.entry(hit.document_id).or_default().0 = hit.score.max(0.0);
        }
    }
    if mode.needs_embedding() {
        for hit in vector {
            signals.entry(hit.document_id).or_default().1 = hit.similarity();
        }
    }

    let mut fused: Vec<FusedScore> = signals
        .into_iter()
        .map(|(document_id, (keyword_score, semantic_score))| FusedScore {
            document_id,
            keyword_score,
            semantic_score,
            hybrid_score: match mode {
                SearchMode::Keyword => keyword_score,
                SearchMode::Semantic => semantic_score,
                SearchMode::Hybrid => hybrid_score(keyword_score, semantic_score),
            },
        })
        .collect();

    fused.sort_by(|a, b| compare(mode, a, b));
    fused
}

fn compare(mode: SearchMode, a: &FusedScore, b: &FusedScore) -> Ordering {
    b.rank_score(mode)
        .partial_cmp(&a.rank_score(mode))
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.document_id.cmp(&b.document_id))
}
