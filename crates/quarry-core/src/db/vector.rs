//! Vector index: cosine nearest-neighbour search over `document_embeddings`.
//!
//! Embeddings are stored as little-endian `f32` BLOBs, which sqlite-vec reads
//! natively. When the extension is loaded the distance is computed in SQL
//! with `vec_distance_cosine`; otherwise the rows are scanned and scored in
//! Rust. Both paths report the same cosine distance in `[0, 2]`.
//!
//! Hits are ranked by clamped similarity, so every document at distance
//! `>= 1` ties at similarity `0` and those ties go to the lowest id.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::db::fts::limit_param;
use crate::error::RetrievalError;
use crate::model::{DocumentId, EMBEDDING_DIM};

/// A nearest-neighbour match.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub document_id: DocumentId,
    /// Cosine distance in `[0, 2]`; lower is closer.
    pub distance: f64,
}

impl VectorHit {
    /// `1 - distance`, clamped to `[0, 1]`.
    #[must_use]
    pub fn similarity(&self) -> f64 {
        (1.0 - self.distance).clamp(0.0, 1.0)
    }
}

/// Encode an embedding as a little-endian `f32` BLOB.
#[must_use]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`encode_embedding`].
///
/// Returns `None` if the length is not a multiple of four.
#[must_use]
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Return the `limit` embedded documents most similar to `query`.
///
/// Documents without an embedding have no row here and are never scored.
///
/// # Errors
///
/// Returns [`RetrievalError::InvalidInput`] when `query` has the wrong
/// dimension, or [`RetrievalError::Persistence`] when the scan fails.
pub fn search_vector(
    conn: &Connection,
    query: &[f32],
    limit: usize,
) -> Result<Vec<VectorHit>, RetrievalError> {
    if query.len() != EMBEDDING_DIM {
        return Err(RetrievalError::InvalidInput(format!(
            "query embedding dimension mismatch: expected {EMBEDDING_DIM}, got {}",
            query.len()
        )));
    }

    if limit == 0 {
        return Ok(Vec::new());
    }

    if quarry_sqlite_vec::is_loaded(conn)
        && let Some(hits) = try_search_sqlite_vec(conn, query, limit)?
    {
        return Ok(hits);
    }

    search_in_process(conn, query, limit)
}

fn try_search_sqlite_vec(
    conn: &Connection,
    query: &[f32],
    limit: usize,
) -> Result<Option<Vec<VectorHit>>, RetrievalError> {
    let mut stmt = match conn.prepare_cached(
        "SELECT document_id, distance FROM ( \
             SELECT document_id, vec_distance_cosine(embedding, ?1) AS distance \
             FROM document_embeddings \
             WHERE dim = ?2 \
         ) \
         WHERE distance IS NOT NULL \
         ORDER BY MIN(distance, 1.0) ASC, document_id ASC \
         LIMIT ?3",
    ) {
        Ok(stmt) => stmt,
        Err(err) => {
            debug!("sqlite-vec KNN unavailable, falling back to in-process scan: {err}");
            return Ok(None);
        }
    };

    let encoded = encode_embedding(query);
    let rows = match stmt.query_map(
        params![encoded, limit_param(EMBEDDING_DIM), limit_param(limit)],
        |row| Ok((row.get::<_, DocumentId>(0)?, row.get::<_, Option<f64>>(1)?)),
    ) {
        Ok(rows) => rows,
        Err(err) => {
            debug!("sqlite-vec KNN query failed, falling back to in-process scan: {err}");
            return Ok(None);
        }
    };

    let mut hits = Vec::new();
    for row in rows {
        let (document_id, distance) = row?;
        match distance {
            Some(distance) if distance.is_finite() => hits.push(VectorHit {
                document_id,
                distance,
            }),
            _ => debug!(document_id, "skipping embedding with undefined cosine distance"),
        }
    }
    Ok(Some(hits))
}

fn search_in_process(
    conn: &Connection,
    query: &[f32],
    limit: usize,
) -> Result<Vec<VectorHit>, RetrievalError> {
    let mut stmt = conn.prepare_cached(
        "SELECT document_id, embedding FROM document_embeddings WHERE dim = ?1",
    )?;
    let rows = stmt.query_map(params![limit_param(EMBEDDING_DIM)], |row| {
        Ok((row.get::<_, DocumentId>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;

    let mut hits = Vec::new();
    for row in rows {
        let (document_id, blob) = row?;
        let Some(embedding) = decode_embedding(&blob) else {
            debug!(document_id, "skipping malformed embedding blob");
            continue;
        };
        let Some(cosine) = cosine_similarity(query, &embedding) else {
            continue;
        };
        hits.push(VectorHit {
            document_id,
            distance: 1.0 - cosine,
        });
    }

    hits.sort_by(|a, b| {
        b.similarity()
            .partial_cmp(&a.similarity())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    hits.truncate(limit);
    Ok(hits)
}

/// Score the given documents against `query`, whatever their rank.
///
/// Ids without an embedding of the right dimension yield no hit. The output
/// follows the order of `ids`.
///
/// # Errors
///
/// [`RetrievalError::InvalidInput`] for a wrong query dimension, or
/// [`RetrievalError::Persistence`] when a read fails.
pub fn score_documents(
    conn: &Connection,
    query: &[f32],
    ids: &[DocumentId],
) -> Result<Vec<VectorHit>, RetrievalError> {
    if query.len() != EMBEDDING_DIM {
        return Err(RetrievalError::InvalidInput(format!(
            "query embedding dimension mismatch: expected {EMBEDDING_DIM}, got {}",
            query.len()
        )));
    }

    let mut stmt = conn.prepare_cached(
        "SELECT embedding FROM document_embeddings WHERE document_id = ?1 AND dim = ?2",
    )?;
    let mut hits = Vec::new();
    for &document_id in ids {
        let blob: Option<Vec<u8>> = stmt
            .query_row(params![document_id, limit_param(EMBEDDING_DIM)], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(embedding) = blob.as_deref().and_then(decode_embedding) else {
            continue;
        };
        if let Some(cosine) = cosine_similarity(query, &embedding) {
            hits.push(VectorHit {
                document_id,
                distance: 1.0 - cosine,
            });
        }
    }
    Ok(hits)
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f64> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f64;
    let mut left_norm_sq = 0.0_f64;
    let mut right_norm_sq = 0.0_f64;

    for (a, b) in left.iter().zip(right.iter()) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }

    Some((dot / denom).clamp(-1.0, 1.0))
}
