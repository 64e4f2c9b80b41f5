//! Error types for the tantivy adapter

use std::path::PathBuf;

/// Result type for adapter operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while indexing or searching
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Codec, schema, field or query error from the core
    #[error(transparent)]
    Core(#[from] quarry_core::Error),

    /// The store exists but no writer has recorded a schema in it yet
    #[error("Index at {0} has no schema; run an update first")]
    UninitializedIndex(PathBuf),

    /// Another writer kept the store locked through every retry
    #[error("Index is locked by another writer (gave up after {attempts} attempts)")]
    StoreLocked { attempts: u32 },

    /// Tantivy error
    #[error("Tantivy error: {0}")]
    Engine(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document payload could not be (de)serialized
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<tantivy::TantivyError> for SearchError {
    fn from(err: tantivy::TantivyError) -> Self {
        SearchError::Engine(err.to_string())
    }
}

impl From<tantivy::directory::error::OpenDirectoryError> for SearchError {
    fn from(err: tantivy::directory::error::OpenDirectoryError) -> Self {
        SearchError::Engine(err.to_string())
    }
}

impl SearchError {
    /// Errors that only concern one object of an update batch.
    pub fn is_object_local(&self) -> bool {
        match self {
            SearchError::Core(err) => err.is_object_local(),
            SearchError::Payload(_) => true,
            _ => false,
        }
    }
}
