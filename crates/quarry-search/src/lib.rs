#![forbid(unsafe_code)]
//! quarry-search library.
//!
//! Embedding providers, the ingestion pipeline, the hybrid query planner and
//! the retrieval service that composes them over a
//! [`quarry_core::DocumentStore`].
//!
//! # Conventions
//!
//! - **Errors**: Request paths return [`quarry_core::RetrievalError`]; setup uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod fusion;
pub mod ingest;
pub mod provider;
pub mod service;

pub use ingest::{IngestionPipeline, SourceFile};
pub use provider::{EmbeddingProvider, HashingProvider, OpenAiProvider, build_provider};
pub use service::RetrievalService;
