//! Error types for rowdiff operations

use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RowdiffError>;

#[derive(Error, Debug)]
pub enum RowdiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Not found: {name}")]
    NotFound { name: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Data processing error: {message}")]
    DataProcessing { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Malformed hunk header: {header:?}")]
    MalformedHunkHeader { header: String },

    #[error("Worker pool error: {message}")]
    Pool { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// An error shared between several readers or threads.
    #[error(transparent)]
    Shared(Arc<RowdiffError>),
}

impl RowdiffError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn data_processing(msg: impl Into<String>) -> Self {
        Self::DataProcessing {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn malformed_hunk_header(header: impl Into<String>) -> Self {
        Self::MalformedHunkHeader {
            header: header.into(),
        }
    }

    /// Wrap into a shareable form. Already-shared errors are not re-wrapped.
    pub fn into_shared(self) -> Arc<RowdiffError> {
        match self {
            Self::Shared(inner) => inner,
            other => Arc::new(other),
        }
    }

    /// The innermost error, looking through any `Shared` layers.
    pub fn root(&self) -> &RowdiffError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Whether this error means the operation was stopped rather than failed.
    pub fn is_stopped(&self) -> bool {
        matches!(self.root(), Self::Cancelled | Self::DeadlineExceeded)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }
}

impl From<Arc<RowdiffError>> for RowdiffError {
    fn from(shared: Arc<RowdiffError>) -> Self {
        Self::Shared(shared)
    }
}
