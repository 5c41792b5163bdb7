//! Retrieval service: the facade boundary layers talk to.
//!
//! Owns the store and the provider, parses modes at the edge, and shapes
//! every outcome into a serializable payload. Errors keep their
//! [`RetrievalError`] kind; [`ErrorBody`] is the outward rendering.

use anyhow::Context;
use chrono::{DateTime, Utc};
use quarry_core::config::QuarryConfig;
use quarry_core::db::DocumentStore;
use quarry_core::db::store::MAX_LIST_LIMIT;
use quarry_core::error::{RetrievalError, StatusClass};
use quarry_core::model::{Document, DocumentId, ScoredResult, SearchMode};
use serde::Serialize;
use std::error::Error as _;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::fusion::{DEFAULT_LIMIT, QueryPlanner};
use crate::ingest::{IngestionPipeline, SourceFile};
use crate::provider::{EmbeddingProvider, build_provider};

/// Upload outcome (`201`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub message: String,
    pub file_id: DocumentId,
    pub filename: String,
    pub content_length: u64,
}

impl From<&Document> for UploadReceipt {
    fn from(doc: &Document) -> Self {
        Self {
            message: format!("{} uploaded and embedded successfully", doc.name),
            file_id: doc.id,
            filename: doc.name.clone(),
            content_length: doc.content_length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HitScores {
    pub keyword: f64,
    pub semantic: f64,
    pub hybrid: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HitMetadata {
    pub filename: String,
    pub content_length: u64,
}

/// One search hit as rendered to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub scores: HitScores,
    pub metadata: HitMetadata,
}

impl From<ScoredResult> for SearchHit {
    fn from(result: ScoredResult) -> Self {
        Self {
            id: result.document_id.to_string(),
            title: result.title,
            snippet: result.snippet,
            scores: HitScores {
                keyword: result.keyword_score,
                semantic: result.semantic_score,
                hybrid: result.hybrid_score,
            },
            metadata: HitMetadata {
                filename: result.metadata.filename,
                content_length: result.metadata.content_length,
            },
        }
    }
}

/// Search outcome (`200`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub results: Vec<SearchHit>,
    pub total_results: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentEntry {
    pub id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub content_length: u64,
    pub has_embedding: bool,
}

/// Listing outcome (`200`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListResponse {
    pub attachments: Vec<AttachmentEntry>,
    pub total: usize,
}

/// Delete outcome (`200`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReceipt {
    pub message: String,
}

/// Index rebuild outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub documents: u64,
    pub in_sync: bool,
}

/// Outward error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl From<&RetrievalError> for ErrorBody {
    fn from(err: &RetrievalError) -> Self {
        let code = err.error_code();
        Self {
            code: code.code(),
            status: err.status().http_status(),
            message: err.public_message(),
            hint: code.hint(),
        }
    }
}

pub struct RetrievalService {
    store: DocumentStore,
    provider: Arc<dyn EmbeddingProvider>,
    default_limit: usize,
}

impl RetrievalService {
    #[must_use]
    pub fn new(store: DocumentStore, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            provider,
            default_limit: DEFAULT_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Open the configured store and build the configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the store path cannot be resolved or the database
    /// cannot be opened.
    pub fn open(config: &QuarryConfig) -> anyhow::Result<Self> {
        let path = config.store_path()?;
        let store = DocumentStore::open(&path)
            .with_context(|| format!("failed to open document store at {}", path.display()))?;
        info!(path = %path.display(), provider = ?config.embedding.provider, "retrieval service ready");
        Ok(Self::new(store, build_provider(&config.embedding))
            .with_default_limit(config.search.default_limit))
    }

    #[must_use]
    pub const fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Ingest one file.
    ///
    /// # Errors
    ///
    /// See [`IngestionPipeline::ingest`].
    pub fn upload_document(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, RetrievalError> {
        let pipeline = IngestionPipeline::new(&self.store, self.provider.as_ref());
        observe("upload", pipeline.ingest(filename, bytes)).map(|doc| UploadReceipt::from(&doc))
    }

    /// Ingest several files as one all-or-nothing batch.
    ///
    /// # Errors
    ///
    /// See [`IngestionPipeline::ingest_batch`].
    pub fn upload_documents(
        &self,
        files: &[SourceFile],
    ) -> Result<Vec<UploadReceipt>, RetrievalError> {
        let pipeline = IngestionPipeline::new(&self.store, self.provider.as_ref());
        observe("upload", pipeline.ingest_batch(files))
            .map(|docs| docs.iter().map(UploadReceipt::from).collect())
    }

    /// Search with the default limit.
    ///
    /// # Errors
    ///
    /// See [`RetrievalService::search_with_limit`].
    pub fn search(&self, query: &str, mode: &str) -> Result<SearchResponse, RetrievalError> {
        self.search_with_limit(query, mode, self.default_limit)
    }

    /// Parse `mode`, then run the planner.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidMode`] for anything but `keyword`,
    /// `semantic` or `hybrid`; otherwise see [`QueryPlanner::search`].
    pub fn search_with_limit(
        &self,
        query: &str,
        mode: &str,
        limit: usize,
    ) -> Result<SearchResponse, RetrievalError> {
        let mode: SearchMode = observe("search", mode.parse())?;
        let planner = QueryPlanner::new(&self.store, self.provider.as_ref());
        let results: Vec<SearchHit> = observe("search", planner.search(query, mode, limit))?
            .into_iter()
            .map(SearchHit::from)
            .collect();

        Ok(SearchResponse {
            query: query.to_owned(),
            mode,
            total_results: results.len(),
            results,
        })
    }

    /// Newest documents first, capped at 100.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub fn list_documents(&self, limit: Option<usize>) -> Result<ListResponse, RetrievalError> {
        let rows = observe("list", self.store.list(limit.unwrap_or(MAX_LIST_LIMIT)))?;
        let attachments: Vec<AttachmentEntry> = rows
            .into_iter()
            .map(|row| AttachmentEntry {
                id: row.id.to_string(),
                filename: row.name,
                uploaded_at: row.uploaded_at,
                content_length: row.content_length,
                has_embedding: row.has_embedding,
            })
            .collect();
        Ok(ListResponse {
            total: attachments.len(),
            attachments,
        })
    }

    /// # Errors
    ///
    /// [`RetrievalError::NotFound`] for an unknown id.
    pub fn get_document(&self, id: DocumentId) -> Result<Document, RetrievalError> {
        observe("show", self.store.get(id))
    }

    /// # Errors
    ///
    /// [`RetrievalError::NotFound`] for an unknown id, or a storage failure.
    pub fn delete_document(&self, id: DocumentId) -> Result<DeleteReceipt, RetrievalError> {
        let removed = observe("delete", self.store.delete(id))?;
        if !removed {
            return observe("delete", Err(RetrievalError::NotFound(id)));
        }
        Ok(DeleteReceipt {
            message: format!("Attachment {id} deleted successfully"),
        })
    }

    /// Rebuild the lexical index and report whether it matches the store.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub fn rebuild_index(&self) -> Result<RebuildReport, RetrievalError> {
        observe("rebuild", self.store.rebuild_lexical_index())?;
        Ok(RebuildReport {
            documents: observe("rebuild", self.store.count())?,
            in_sync: observe("rebuild", self.store.lexical_in_sync())?,
        })
    }
}

/// Log a failed operation with full detail; callers only see the public
/// rendering.
fn observe<T>(operation: &str, result: Result<T, RetrievalError>) -> Result<T, RetrievalError> {
    if let Err(err) = &result {
        let code = err.error_code().code();
        match err.status() {
            StatusClass::ServerError => {
                let cause = err.source().map(ToString::to_string).unwrap_or_default();
                error!(operation, code, error = %err, cause = %cause, "operation failed");
            }
            StatusClass::ClientError | StatusClass::NotFound => {
                debug!(operation, code, error = %err, "request rejected");
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HashingProvider;

    fn service() -> RetrievalService {
        RetrievalService::new(
            DocumentStore::open_in_memory().expect("open store"),
            Arc::new(HashingProvider::new()),
        )
    }

    #[test]
    fn upload_receipt_matches_boundary_shape() {
        let svc = service();
        let receipt = svc.upload_document("notes.txt", b"machine learning").unwrap();
        assert_eq!(receipt.filename, "notes.txt");
        assert_eq!(receipt.content_length, 16);
        assert_eq!(receipt.message, "notes.txt uploaded and embedded successfully");

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["file_id"], receipt.file_id);
    }

    #[test]
    fn invalid_mode_is_rejected_before_planning() {
        let svc = service();
        let err = svc.search("", "fuzzy").unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidMode(ref m) if m == "fuzzy"));
        assert_eq!(ErrorBody::from(&err).status, 400);
    }

    #[test]
    fn search_response_serializes_like_the_boundary() {
        let svc = service();
        svc.upload_document("ml.txt", b"machine learning basics").unwrap();

        let response = svc.search("machine", "keyword").unwrap();
        assert_eq!(response.total_results, 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mode"], "keyword");
        assert_eq!(json["query"], "machine");
        let hit = &json["results"][0];
        assert!(hit["id"].is_string());
        assert_eq!(hit["title"], "ml.txt");
        assert_eq!(hit["scores"]["semantic"], 0.0);
        assert_eq!(hit["metadata"]["filename"], "ml.txt");
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let svc = service();
        let err = svc.delete_document(77).unwrap_err();
        let body = ErrorBody::from(&err);
        assert_eq!(body.status, 404);
        assert_eq!(body.code, "E2001");
    }

    #[test]
    fn delete_receipt_message() {
        let svc = service();
        let receipt = svc.upload_document("a.txt", b"alpha").unwrap();
        let deleted = svc.delete_document(receipt.file_id).unwrap();
        assert_eq!(
            deleted.message,
            format!("Attachment {} deleted successfully", receipt.file_id)
        );
        assert_eq!(svc.list_documents(None).unwrap().total, 0);
    }

    #[test]
    fn server_errors_hide_internal_detail() {
        let err = RetrievalError::from(quarry_core::error::ProviderError::Unavailable(
            "dial tcp 10.0.0.3:443: secret-host refused".into(),
        ));
        let body = ErrorBody::from(&err);
        assert_eq!(body.status, 500);
        assert!(!body.message.contains("secret-host"));
    }

    #[test]
    fn rebuild_reports_in_sync() {
        let svc = service();
        svc.upload_document("a.txt", b"alpha").unwrap();
        let report = svc.rebuild_index().unwrap();
        assert_eq!(report.documents, 1);
        assert!(report.in_sync);
    }

    #[test]
    fn default_limit_applies() {
        let svc = service().with_default_limit(2);
        for i in 0..5 {
            svc.upload_document(&format!("{i}.txt"), b"shared words here").unwrap();
        }
        assert_eq!(svc.search("shared", "keyword").unwrap().results.len(), 2);
    }
}
