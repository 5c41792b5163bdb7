//! The document store: rows, lexical index and vector index behind one
//! transactional boundary.
//!
//! Every write is a single SQLite transaction covering the `documents` row,
//! its `documents_fts` entry (via trigger) and its `document_embeddings` row,
//! so readers see a document in all of its indexes or in none of them.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::db::fts::{self, LexicalHit, limit_param};
use crate::db::vector::{self, VectorHit, decode_embedding, encode_embedding};
use crate::error::RetrievalError;
use crate::model::{Document, DocumentId, DocumentSummary, NewDocument, char_count};

/// Hard cap on [`DocumentStore::list`].
pub const MAX_LIST_LIMIT: usize = 100;

/// Text of a candidate document, as needed to render a search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDocument {
    pub id: DocumentId,
    pub name: String,
    pub content: String,
    pub content_length: u64,
}

/// Raw index output for one query, read from a single snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    pub lexical: Vec<LexicalHit>,
    pub vector: Vec<VectorHit>,
    pub documents: HashMap<DocumentId, CandidateDocument>,
}

/// SQLite-backed document store.
///
/// `Send + Sync`: the connection sits behind a mutex that is held for one
/// storage operation at a time.
pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl DocumentStore {
    /// Open (or create) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::from_connection(super::open_database(path)?))
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_connection(super::open_in_memory()?))
    }

    /// Wrap an already-migrated connection.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // An interrupted transaction rolls back on drop.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert one document with its index entries.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Validation`] for bad name/content/embedding shape,
    /// [`RetrievalError::Persistence`] if the write fails (nothing is kept).
    pub fn insert(&self, doc: NewDocument) -> Result<Document, RetrievalError> {
        let mut inserted = self.insert_many(vec![doc])?;
        inserted
            .pop()
            .ok_or_else(|| RetrievalError::Persistence(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Insert several documents in one transaction: all or none.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::insert`]; validation runs on every document
    /// before anything is written.
    pub fn insert_many(&self, docs: Vec<NewDocument>) -> Result<Vec<Document>, RetrievalError> {
        for doc in &docs {
            doc.validate()?;
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(docs.len());

        for doc in docs {
            let uploaded_at = now_micros();
            let content_length = char_count(&doc.content);
            tx.execute(
                "INSERT INTO documents (name, content, content_length, uploaded_at_us)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    doc.name,
                    doc.content,
                    i64::try_from(content_length).unwrap_or(i64::MAX),
                    uploaded_at
                ],
            )?;
            let id = tx.last_insert_rowid();

            if let Some(embedding) = &doc.embedding {
                tx.execute(
                    "INSERT INTO document_embeddings (document_id, dim, embedding)
                     VALUES (?1, ?2, ?3)",
                    params![
                        id,
                        limit_param(embedding.len()),
                        encode_embedding(embedding)
                    ],
                )?;
            }

            inserted.push(Document {
                id,
                name: doc.name,
                content: doc.content,
                content_length,
                embedding: doc.embedding,
                uploaded_at: from_micros(uploaded_at, 0)?,
                updated_at: None,
            });
        }

        tx.commit()?;
        for doc in &inserted {
            info!(
                document_id = doc.id,
                name = %doc.name,
                content_length = doc.content_length,
                embedded = doc.has_embedding(),
                "document stored"
            );
        }
        Ok(inserted)
    }

    /// Fetch one document, embedding included.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::NotFound`] if no such id exists.
    pub fn get(&self, id: DocumentId) -> Result<Document, RetrievalError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT d.id, d.name, d.content, d.content_length, d.uploaded_at_us,
                        d.updated_at_us, e.embedding
                 FROM documents d
                 LEFT JOIN document_embeddings e ON e.document_id = d.id
                 WHERE d.id = ?1",
                [id],
                |row| {
                    let blob: Option<Vec<u8>> = row.get(6)?;
                    Ok(Document {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        content: row.get(2)?,
                        content_length: read_length(row, 3)?,
                        embedding: blob.as_deref().and_then(decode_embedding),
                        uploaded_at: from_micros(row.get(4)?, 4)?,
                        updated_at: row
                            .get::<_, Option<i64>>(5)?
                            .map(|us| from_micros(us, 5))
                            .transpose()?,
                    })
                },
            )
            .optional()?;

        row.ok_or(RetrievalError::NotFound(id))
    }

    /// Newest documents first, at most `min(limit, MAX_LIST_LIMIT)` rows.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Persistence`] if the query fails.
    pub fn list(&self, limit: usize) -> Result<Vec<DocumentSummary>, RetrievalError> {
        let limit = limit.min(MAX_LIST_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare_cached(
            "SELECT d.id, d.name, d.content_length, d.uploaded_at_us,
                    e.document_id IS NOT NULL
             FROM documents d
             LEFT JOIN document_embeddings e ON e.document_id = d.id
             ORDER BY d.uploaded_at_us DESC, d.id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit_param(limit)], |row| {
            Ok(DocumentSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                content_length: read_length(row, 2)?,
                uploaded_at: from_micros(row.get(3)?, 3)?,
                has_embedding: row.get(4)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a document and purge it from both indexes.
    ///
    /// Returns `false` (not an error) when the id does not exist.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Persistence`] if the delete fails (nothing changes).
    pub fn delete(&self, id: DocumentId) -> Result<bool, RetrievalError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM document_embeddings WHERE document_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM documents WHERE id = ?1", [id])?;
        tx.commit()?;

        if removed > 0 {
            info!(document_id = id, "document deleted");
        }
        Ok(removed > 0)
    }

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Persistence`] if the query fails.
    pub fn count(&self) -> Result<u64, RetrievalError> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Lexical index contract on its own.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Persistence`] if the FTS query fails.
    pub fn search_lexical(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<LexicalHit>, RetrievalError> {
        Ok(fts::search_lexical(&self.conn(), query, limit)?)
    }

    /// Vector index contract on its own.
    ///
    /// # Errors
    ///
    /// See [`vector::search_vector`].
    pub fn search_vector(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, RetrievalError> {
        vector::search_vector(&self.conn(), embedding, limit)
    }

    /// Consult the requested indexes and load the text of every candidate,
    /// all inside one read transaction.
    ///
    /// `None` skips that index. Each index returns at most `pool` hits, except
    /// that with both indexes requested every embedded lexical hit also gets a
    /// vector hit.
    ///
    /// # Errors
    ///
    /// Any index or read failure.
    pub fn query_indexes(
        &self,
        lexical: Option<&str>,
        embedding: Option<&[f32]>,
        pool: usize,
    ) -> Result<CandidateSet, RetrievalError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let lexical = match lexical {
            Some(query) => fts::search_lexical(&tx, query, pool)?,
            None => Vec::new(),
        };
        let mut vector = match embedding {
            Some(embedding) => vector::search_vector(&tx, embedding, pool)?,
            None => Vec::new(),
        };
        // Lexical matches outside the nearest-neighbour pool are scored directly.
        if let Some(embedding) = embedding {
            let ranked: HashSet<DocumentId> = vector.iter().map(|hit| hit.document_id).collect();
            let unranked: Vec<DocumentId> = lexical
                .iter()
                .map(|hit| hit.document_id)
                .filter(|id| !ranked.contains(id))
                .collect();
            if !unranked.is_empty() {
                vector.extend(vector::score_documents(&tx, embedding, &unranked)?);
            }
        }

        let mut documents = HashMap::with_capacity(lexical.len() + vector.len());
        {
            let mut stmt = tx.prepare_cached(
                "SELECT id, name, content, content_length FROM documents WHERE id = ?1",
            )?;
            let ids = lexical
                .iter()
                .map(|hit| hit.document_id)
                .chain(vector.iter().map(|hit| hit.document_id));
            for id in ids {
                if documents.contains_key(&id) {
                    continue;
                }
                let candidate = stmt
                    .query_row([id], |row| {
                        Ok(CandidateDocument {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            content: row.get(2)?,
                            content_length: read_length(row, 3)?,
                        })
                    })
                    .optional()?;
                if let Some(candidate) = candidate {
                    documents.insert(id, candidate);
                }
            }
        }

        tx.commit()?;
        Ok(CandidateSet {
            lexical,
            vector,
            documents,
        })
    }

    /// Rebuild the lexical index from the `documents` table.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Persistence`] if the rebuild fails (the previous
    /// index is kept).
    pub fn rebuild_lexical_index(&self) -> Result<(), RetrievalError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        fts::rebuild_lexical_index(&tx)?;
        tx.execute(
            "UPDATE store_meta SET last_rebuild_at_us = ?1 WHERE id = 1",
            [now_micros()],
        )?;
        tx.commit()?;
        info!("lexical index rebuilt");
        Ok(())
    }

    /// Whether the lexical index matches the `documents` table.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::Persistence`] if the check fails.
    pub fn lexical_in_sync(&self) -> Result<bool, RetrievalError> {
        Ok(fts::lexical_in_sync(&self.conn())?)
    }
}

fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

fn from_micros(us: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            format!("timestamp out of range: {us}").into(),
        )
    })
}

fn read_length(row: &Row<'_>, column: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(column)?;
    u64::try_from(value).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(err))
    })
}
