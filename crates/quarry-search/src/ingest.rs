//! Ingestion: raw file bytes → embedded, stored document.
//!
//! Steps, in order, each aborting with nothing written:
//! 1. validate the filename
//! 2. decode (UTF-8, else Latin-1; NUL means binary)
//! 3. reject text that is empty once trimmed
//! 4. embed the trimmed text
//! 5. insert the decoded text, untrimmed, with its vector in one transaction
//!
//! The store lock is only taken in step 5, after the provider call returns.

use quarry_core::db::DocumentStore;
use quarry_core::error::{ProviderError, RetrievalError};
use quarry_core::model::{Document, NewDocument, validate_name};
use tracing::{error, info, warn};

use crate::provider::EmbeddingProvider;

/// A file handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Decode file bytes as text.
///
/// Valid UTF-8 is used as is; anything else is read as Latin-1, which maps
/// every byte to a character. Text containing NUL is treated as binary.
///
/// # Errors
///
/// [`RetrievalError::UnreadableContent`] for binary input.
pub fn decode_text(bytes: &[u8]) -> Result<String, RetrievalError> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.iter().copied().map(char::from).collect(),
    };
    if text.contains('\0') {
        return Err(RetrievalError::UnreadableContent);
    }
    Ok(text)
}

/// A validated file, ready to embed and store.
struct Prepared {
    name: String,
    content: String,
}

impl Prepared {
    fn embed_text(&self) -> &str {
        self.content.trim()
    }
}

/// Validate and decode one file.
fn prepare(name: &str, bytes: &[u8]) -> Result<Prepared, RetrievalError> {
    validate_name(name)?;
    let content = decode_text(bytes)?;
    if content.trim().is_empty() {
        return Err(RetrievalError::EmptyContent);
    }
    Ok(Prepared {
        name: name.to_owned(),
        content,
    })
}

pub struct IngestionPipeline<'a> {
    store: &'a DocumentStore,
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> IngestionPipeline<'a> {
    #[must_use]
    pub const fn new(store: &'a DocumentStore, provider: &'a dyn EmbeddingProvider) -> Self {
        Self { store, provider }
    }

    /// Ingest one file.
    ///
    /// # Errors
    ///
    /// Validation, decoding and empty-content errors before any side effect;
    /// [`RetrievalError::Embedding`] or [`RetrievalError::Persistence`] with
    /// nothing written.
    pub fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<Document, RetrievalError> {
        let prepared = prepare(filename, bytes)?;

        let embedding = self.provider.embed(prepared.embed_text()).map_err(|err| {
            warn!(
                provider = self.provider.name(),
                filename = %prepared.name,
                error = %err,
                "embedding failed, document not stored"
            );
            RetrievalError::from(err)
        })?;

        let doc = self
            .store
            .insert(NewDocument {
                name: prepared.name,
                content: prepared.content,
                embedding: Some(embedding),
            })
            .inspect_err(|err| log_store_failure(err, 1))?;

        info!(
            document_id = doc.id,
            filename = %doc.name,
            content_length = doc.content_length,
            "document ingested"
        );
        Ok(doc)
    }

    /// Ingest several files with one provider call and one transaction.
    ///
    /// All files are validated first; any failure rejects the whole batch.
    ///
    /// # Errors
    ///
    /// As [`IngestionPipeline::ingest`], for the first offending file.
    pub fn ingest_batch(&self, files: &[SourceFile]) -> Result<Vec<Document>, RetrievalError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = files
            .iter()
            .map(|file| prepare(&file.name, &file.bytes))
            .collect::<Result<Vec<_>, _>>()?;

        let texts: Vec<&str> = prepared.iter().map(Prepared::embed_text).collect();
        let embeddings = self.provider.embed_many(&texts).map_err(|err| {
            warn!(
                provider = self.provider.name(),
                files = files.len(),
                error = %err,
                "batch embedding failed, nothing stored"
            );
            RetrievalError::from(err)
        })?;

        if embeddings.len() != prepared.len() {
            return Err(RetrievalError::Embedding(ProviderError::Response(format!(
                "expected {} embeddings, got {}",
                prepared.len(),
                embeddings.len()
            ))));
        }

        let docs: Vec<NewDocument> = prepared
            .into_iter()
            .zip(embeddings)
            .map(|(Prepared { name, content }, embedding)| NewDocument {
                name,
                content,
                embedding: Some(embedding),
            })
            .collect();

        let stored = self
            .store
            .insert_many(docs)
            .inspect_err(|err| log_store_failure(err, files.len()))?;
        info!(count = stored.len(), "batch ingested");
        Ok(stored)
    }
}

fn log_store_failure(err: &RetrievalError, files: usize) {
    if let RetrievalError::Persistence(source) = err {
        error!(files, error = %source, "failed to store ingested documents");
    }
}
