//! Canonical SQLite schema for the document store.
//!
//! - `documents` is the source of truth; ids come from `AUTOINCREMENT` so a
//!   deleted id is never handed out again
//! - `document_embeddings` is the vector index: one little-endian f32 BLOB per
//!   embedded document, cascading on document delete
//! - `documents_fts` is the lexical index, kept in sync by triggers
//! - `store_meta` records the applied schema version

/// Migration v1: documents, vector index and metadata.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0 AND length(name) <= 500),
    content TEXT NOT NULL CHECK (length(trim(content)) > 0),
    content_length INTEGER NOT NULL CHECK (content_length >= 0),
    uploaded_at_us INTEGER NOT NULL,
    updated_at_us INTEGER
);

CREATE TABLE IF NOT EXISTS document_embeddings (
    document_id INTEGER PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
    dim INTEGER NOT NULL CHECK (dim > 0),
    embedding BLOB NOT NULL CHECK (length(embedding) = dim * 4)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_rebuild_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, last_rebuild_at_us)
VALUES (1, 1, 0);
"#;

/// Migration v2: listing index plus the FTS5 lexical index and its triggers.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_documents_uploaded
    ON documents(uploaded_at_us DESC, id DESC);

CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    content,
    tokenize='porter unicode61',
    prefix='2 3'
);

CREATE TRIGGER IF NOT EXISTS documents_ai
AFTER INSERT ON documents
BEGIN
    INSERT INTO documents_fts(rowid, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS documents_ad
AFTER DELETE ON documents
BEGIN
    DELETE FROM documents_fts WHERE rowid = old.id;
END;

DELETE FROM documents_fts;
INSERT INTO documents_fts(rowid, content)
SELECT id, content FROM documents;

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
"#;

/// Indexes expected by the listing path.
pub const REQUIRED_INDEXES: &[&str] = &["idx_documents_uploaded"];

/// Triggers that keep `documents_fts` in step with `documents`.
pub const REQUIRED_TRIGGERS: &[&str] = &["documents_ai", "documents_ad"];
