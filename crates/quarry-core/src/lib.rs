//! quarry-core library.
//!
//! Document model, error taxonomy, configuration, and the SQLite document
//! store with its lexical (FTS5) and vector indexes.
//!
//! # Conventions
//!
//! - **Errors**: Operations callers can act on return
//!   [`error::RetrievalError`]; setup paths (opening, config) use
//!   `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use db::DocumentStore;
pub use error::{ErrorCode, ProviderError, RetrievalError, StatusClass};
pub use model::{Document, DocumentId, DocumentSummary, NewDocument, ScoredResult, SearchMode};
