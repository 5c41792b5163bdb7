//! Lexical index: FTS5 full-text search with BM25 ranking.
//!
//! `documents_fts` mirrors `documents.content` through INSERT/DELETE
//! triggers (see [`super::schema`]), keyed by `rowid = documents.id`.
//!
//! # Tokenizer
//!
//! Porter stemmer + `unicode61`, so "running" matches "run" and word
//! breaking is Unicode-aware.
//!
//! # Query construction
//!
//! User text is never handed to FTS5 as query syntax. It is split into
//! alphanumeric tokens, each token becomes a double-quoted phrase, and the
//! phrases are joined with spaces (implicit AND). The resulting expression is
//! bound as a parameter, so operators such as `NOT`, `*` or `"` typed by a
//! caller are plain text.
//!
//! # Scores
//!
//! FTS5's `bm25()` is lower-is-better and negative for matches. Hits are
//! reported with `score = -bm25()`, i.e. non-negative and higher-is-better.

use rusqlite::{Connection, params};

use crate::model::DocumentId;

/// A lexical match.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub document_id: DocumentId,
    /// Non-negative BM25 relevance; higher is better.
    pub score: f64,
}

/// Token characters for query splitting: alphanumerics plus private-use
/// code points, approximating the `unicode61` defaults (`L* N* Co`).
///
/// Combining marks split a token here. The index folds them away with the
/// diacritics, so `cafe\u{301}` still queries as `cafe`. Characters where the
/// two rules still disagree (marks that Rust counts as alphabetic) can yield
/// a token the index never produced, which simply matches nothing.
fn is_token_char(c: char) -> bool {
    c.is_alphanumeric()
        || matches!(
            c,
            '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
        )
}

/// Build the FTS5 MATCH expression for free text.
///
/// Returns `None` when the text has no indexable tokens.
#[must_use]
pub fn build_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !is_token_char(c))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Search the lexical index.
///
/// Documents with no match are absent from the output. A query without
/// indexable tokens, or `limit == 0`, yields an empty result without
/// touching the index.
///
/// # Errors
///
/// Returns an error if the FTS5 table is missing or the query fails.
pub fn search_lexical(
    conn: &Connection,
    query: &str,
    limit: usize,
) -> rusqlite::Result<Vec<LexicalHit>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let Some(expression) = build_match_expression(query) else {
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare_cached(
        "SELECT rowid, bm25(documents_fts) AS rank \
         FROM documents_fts \
         WHERE documents_fts MATCH ?1 \
         ORDER BY rank, rowid \
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![expression, limit_param(limit)], |row| {
        let rank: f64 = row.get(1)?;
        Ok(LexicalHit {
            document_id: row.get(0)?,
            score: (-rank).max(0.0),
        })
    })?;

    rows.collect()
}

/// Rebuild the lexical index from the current `documents` table.
///
/// # Errors
///
/// Returns an error if the rebuild SQL fails.
pub fn rebuild_lexical_index(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DELETE FROM documents_fts;
         INSERT INTO documents_fts(rowid, content)
         SELECT id, content FROM documents;",
    )
}

/// Return the number of rows in the lexical index.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn lexical_row_count(conn: &Connection) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents_fts", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Check that every document has exactly one lexical entry and vice versa.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn lexical_in_sync(conn: &Connection) -> rusqlite::Result<bool> {
    let documents: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
    let orphans: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents_fts f \
         LEFT JOIN documents d ON d.id = f.rowid \
         WHERE d.id IS NULL",
        [],
        |row| row.get(0),
    )?;
    let indexed = i64::try_from(lexical_row_count(conn)?).unwrap_or(i64::MAX);

    Ok(orphans == 0 && indexed == documents)
}

pub(crate) fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
