//! Error taxonomy for the memory stores.
//!
//! Only [`MemoryError::DimensionMismatch`] is meant to reach callers of the
//! [`CombinedMemoryManager`](crate::memory::manager::CombinedMemoryManager);
//! every other variant is caught at the manager boundary and turned into a
//! degraded result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// An embedding did not have the store's fixed dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An embedding, summary, or storage backend could not be reached.
    #[error("{backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Persisted index, metadata, or log artifacts were unreadable or inconsistent.
    #[error("corrupt persisted state at {path}: {reason}")]
    CorruptPersistedState { path: String, reason: String },

    /// A stored field could not be interpreted (bad timestamp, missing score).
    #[error("malformed {field}: {reason}")]
    MalformedEntryField { field: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("index encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl MemoryError {
    pub fn unavailable(backend: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    pub fn corrupt(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::CorruptPersistedState {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
