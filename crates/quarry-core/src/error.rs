//! Error taxonomy shared by the store, the ingestion pipeline and the
//! planner.
//!
//! Every [`RetrievalError`] maps to exactly one [`ErrorCode`], and every code
//! maps to exactly one [`StatusClass`]. Boundary layers render
//! [`RetrievalError::public_message`], never the source chain.

use std::fmt;

/// Outward status class of an error, independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// The caller sent something unusable. Not retried.
    ClientError,
    /// The referenced document does not exist.
    NotFound,
    /// A dependency (provider or storage) failed.
    ServerError,
}

impl StatusClass {
    /// HTTP-equivalent status code.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ClientError => 400,
            Self::NotFound => 404,
            Self::ServerError => 500,
        }
    }

    /// Process exit code used by the CLI.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::ServerError => 1,
            Self::ClientError => 2,
            Self::NotFound => 3,
        }
    }
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidInput,
    ValidationFailed,
    UnreadableContent,
    EmptyContent,
    EmptyQuery,
    InvalidMode,
    ProviderUnavailable,
    ProviderRateLimited,
    ProviderResponse,
    PersistenceFailed,
    DocumentNotFound,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "E1001",
            Self::ValidationFailed => "E1002",
            Self::UnreadableContent => "E1003",
            Self::EmptyContent => "E1004",
            Self::EmptyQuery => "E1005",
            Self::InvalidMode => "E1006",
            Self::DocumentNotFound => "E2001",
            Self::ProviderUnavailable => "E3001",
            Self::ProviderRateLimited => "E3002",
            Self::ProviderResponse => "E3003",
            Self::PersistenceFailed => "E4001",
        }
    }

    /// Short human-facing summary, safe to show to callers.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid input",
            Self::ValidationFailed => "Document failed validation",
            Self::UnreadableContent => "File content is not readable as text",
            Self::EmptyContent => "File content is empty",
            Self::EmptyQuery => "Query cannot be empty",
            Self::InvalidMode => "Invalid search mode",
            Self::DocumentNotFound => "Document not found",
            Self::ProviderUnavailable => "Embedding provider unavailable",
            Self::ProviderRateLimited => "Embedding provider rate limited the request",
            Self::ProviderResponse => "Embedding provider returned a malformed response",
            Self::PersistenceFailed => "Storage operation failed",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidInput | Self::ValidationFailed => {
                Some("Names must be 1-500 characters and content must not be blank.")
            }
            Self::UnreadableContent => Some("Upload UTF-8 or Latin-1 encoded text files."),
            Self::EmptyContent => Some("Upload a file with non-whitespace content."),
            Self::EmptyQuery => Some("Provide a non-empty query string."),
            Self::InvalidMode => Some("Use one of: keyword, semantic, hybrid."),
            Self::DocumentNotFound => Some("Run `quarry list` to see stored document ids."),
            Self::ProviderUnavailable => {
                Some("Check network access and the embedding API key, then retry.")
            }
            Self::ProviderRateLimited => Some("Wait before retrying the request."),
            Self::ProviderResponse => None,
            Self::PersistenceFailed => Some("Check disk space and database permissions."),
        }
    }

    /// Outward status class for this code.
    #[must_use]
    pub const fn status(self) -> StatusClass {
        match self {
            Self::InvalidInput
            | Self::ValidationFailed
            | Self::UnreadableContent
            | Self::EmptyContent
            | Self::EmptyQuery
            | Self::InvalidMode => StatusClass::ClientError,
            Self::DocumentNotFound => StatusClass::NotFound,
            Self::ProviderUnavailable
            | Self::ProviderRateLimited
            | Self::ProviderResponse
            | Self::PersistenceFailed => StatusClass::ServerError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures of the embedding provider. Never retried by the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Input text was blank after trimming.
    #[error("embedding input must not be blank")]
    InvalidInput,

    /// Network, authentication or timeout failure.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    /// The provider throttled the request.
    #[error("embedding provider rate limited the request")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider answered with something unusable.
    #[error("malformed embedding response: {0}")]
    Response(String),
}

impl ProviderError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput => ErrorCode::InvalidInput,
            Self::Unavailable(_) => ErrorCode::ProviderUnavailable,
            Self::RateLimited { .. } => ErrorCode::ProviderRateLimited,
            Self::Response(_) => ErrorCode::ProviderResponse,
        }
    }
}

/// Errors surfaced by every retrieval operation.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("file content is not readable as text")]
    UnreadableContent,

    #[error("file content is empty")]
    EmptyContent,

    #[error("query cannot be empty")]
    EmptyQuery,

    #[error("invalid search mode '{0}': expected keyword, semantic or hybrid")]
    InvalidMode(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    /// Display stays generic; the rusqlite detail is only reachable via
    /// `source()` and the logs.
    #[error("storage operation failed")]
    Persistence(#[from] rusqlite::Error),

    #[error("document {0} not found")]
    NotFound(i64),
}

impl RetrievalError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::UnreadableContent => ErrorCode::UnreadableContent,
            Self::EmptyContent => ErrorCode::EmptyContent,
            Self::EmptyQuery => ErrorCode::EmptyQuery,
            Self::InvalidMode(_) => ErrorCode::InvalidMode,
            Self::Embedding(inner) => inner.error_code(),
            Self::Persistence(_) => ErrorCode::PersistenceFailed,
            Self::NotFound(_) => ErrorCode::DocumentNotFound,
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusClass {
        self.error_code().status()
    }

    /// Message safe to hand to callers.
    ///
    /// Client errors describe what the caller sent; server errors collapse to
    /// the code's fixed summary so provider/storage internals stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.status() {
            StatusClass::ClientError | StatusClass::NotFound => self.to_string(),
            StatusClass::ServerError => self.error_code().message().to_string(),
        }
    }
}
