//! Documents, search modes and scored results.

use crate::error::RetrievalError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Store-assigned document identifier. Monotonic, never reused.
pub type DocumentId = i64;

/// Dimension of every stored and query embedding (`text-embedding-3-small`).
pub const EMBEDDING_DIM: usize = 1536;

/// Maximum document name length, in characters.
pub const MAX_NAME_CHARS: usize = 500;

/// Snippet length before the ellipsis marker, in characters.
pub const SNIPPET_CHARS: usize = 200;

pub const SNIPPET_ELLIPSIS: &str = "...";

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub content: String,
    /// Character count of `content`.
    pub content_length: u64,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    #[must_use]
    pub const fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Listing row: everything but the content and the vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub name: String,
    pub content_length: u64,
    pub uploaded_at: DateTime<Utc>,
    pub has_embedding: bool,
}

/// A document waiting to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub name: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

impl NewDocument {
    /// Check name, content and embedding shape.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Validation`] describing the first violation.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        validate_name(&self.name)?;
        if self.content.trim().is_empty() {
            return Err(RetrievalError::Validation(
                "content must not be empty".into(),
            ));
        }
        if let Some(embedding) = &self.embedding
            && embedding.len() != EMBEDDING_DIM
        {
            return Err(RetrievalError::Validation(format!(
                "embedding dimension must be {EMBEDDING_DIM}, got {}",
                embedding.len()
            )));
        }
        Ok(())
    }
}

/// Check that a document name is non-blank and at most [`MAX_NAME_CHARS`].
///
/// # Errors
///
/// Returns [`RetrievalError::Validation`] on violation.
pub fn validate_name(name: &str) -> Result<(), RetrievalError> {
    if name.trim().is_empty() {
        return Err(RetrievalError::Validation("name must not be empty".into()));
    }
    let chars = name.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(RetrievalError::Validation(format!(
            "name must be at most {MAX_NAME_CHARS} characters, got {chars}"
        )));
    }
    Ok(())
}

/// Character (not byte) length, as stored in `content_length`.
#[must_use]
pub fn char_count(text: &str) -> u64 {
    text.chars().count() as u64
}

/// First [`SNIPPET_CHARS`] characters of `content`, plus `...` when cut.
#[must_use]
pub fn snippet(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + SNIPPET_ELLIPSIS.len());
            out.push_str(&content[..cut]);
            out.push_str(SNIPPET_ELLIPSIS);
            out
        }
        None => content.to_owned(),
    }
}

/// Which indexes a query consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Lexical index only.
    Keyword,
    /// Vector index only.
    Semantic,
    /// Both, fused.
    #[default]
    Hybrid,
}

impl SearchMode {
    pub const ALL: [Self; 3] = [Self::Keyword, Self::Semantic, Self::Hybrid];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }

    #[must_use]
    pub const fn needs_embedding(self) -> bool {
        matches!(self, Self::Semantic | Self::Hybrid)
    }

    #[must_use]
    pub const fn needs_lexical(self) -> bool {
        matches!(self, Self::Keyword | Self::Hybrid)
    }

    /// The score field results are ordered by in this mode.
    #[must_use]
    pub const fn score_of(self, result: &ScoredResult) -> f64 {
        match self {
            Self::Keyword => result.keyword_score,
            Self::Semantic => result.semantic_score,
            Self::Hybrid => result.hybrid_score,
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = RetrievalError;

    /// Exact, case-sensitive match on the three literal mode names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(RetrievalError::InvalidMode(other.to_owned())),
        }
    }
}

/// Display metadata attached to each result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultMetadata {
    pub filename: String,
    pub content_length: u64,
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub document_id: DocumentId,
    pub title: String,
    pub snippet: String,
    pub keyword_score: f64,
    pub semantic_score: f64,
    pub hybrid_score: f64,
    pub metadata: ResultMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn snippet_keeps_short_content_verbatim() {
        assert_eq!(snippet("machine learning basics"), "machine learning basics");
        let exact = "a".repeat(SNIPPET_CHARS);
        assert_eq!(snippet(&exact), exact);
    }

    #[test]
    fn snippet_truncates_at_200_chars() {
        let long = "b".repeat(SNIPPET_CHARS + 1);
        let out = snippet(&long);
        assert_eq!(out.chars().count(), SNIPPET_CHARS + SNIPPET_ELLIPSIS.len());
        assert!(out.ends_with("..."));
        assert!(out.starts_with(&"b".repeat(SNIPPET_CHARS)));
    }

    #[test]
    fn snippet_counts_characters_not_bytes() {
        let long = "é".repeat(250);
        let out = snippet(&long);
        assert_eq!(out, format!("{}...", "é".repeat(SNIPPET_CHARS)));
    }

    #[test]
    fn mode_parses_exact_literals_only() {
        for mode in SearchMode::ALL {
            assert_eq!(mode.as_str().parse::<SearchMode>().unwrap(), mode);
        }
        for bad in ["", "Keyword", "fuzzy", " hybrid"] {
            let err = bad.parse::<SearchMode>().unwrap_err();
            assert!(matches!(err, RetrievalError::InvalidMode(_)), "{bad}");
        }
    }

    #[test]
    fn mode_index_requirements() {
        assert!(SearchMode::Keyword.needs_lexical());
        assert!(!SearchMode::Keyword.needs_embedding());
        assert!(SearchMode::Semantic.needs_embedding());
        assert!(!SearchMode::Semantic.needs_lexical());
        assert!(SearchMode::Hybrid.needs_lexical() && SearchMode::Hybrid.needs_embedding());
        assert_eq!(SearchMode::default(), SearchMode::Hybrid);
    }

    #[test]
    fn validate_name_bounds() {
        assert!(validate_name("notes.txt").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"n".repeat(MAX_NAME_CHARS)).is_ok());
        assert!(validate_name(&"n".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn new_document_rejects_wrong_dimension() {
        let doc = NewDocument {
            name: "a.txt".into(),
            content: "hello".into(),
            embedding: Some(vec![0.0; 3]),
        };
        let err = doc.validate().unwrap_err();
        assert!(err.to_string().contains("dimension"));
    }

    #[test]
    fn char_count_is_unicode_aware() {
        assert_eq!(char_count("naïve"), 5);
        assert_eq!(char_count(""), 0);
    }

    proptest! {
        #[test]
        fn snippet_never_exceeds_203_chars(content in ".{0,400}") {
            let out = snippet(&content);
            prop_assert!(out.chars().count() <= SNIPPET_CHARS + SNIPPET_ELLIPSIS.len());
            if content.chars().count() <= SNIPPET_CHARS {
                prop_assert_eq!(out, content);
            }
        }
    }
}
