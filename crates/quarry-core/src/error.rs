use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Startup configuration is unusable (for example the store path is unset).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A value cannot be canonically encoded or decoded for its declared type.
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Schema error: {0}")]
    Schema(String),

    /// A query, sort or facet request names a field the schema does not know.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Kind is not registered for indexing: {0}")]
    UnindexedKind(String),

    #[error("Malformed query: {0}")]
    Query(String),
}

impl Error {
    pub fn encoding(msg: impl Into<String>) -> Self {
        Error::Encoding(msg.into())
    }

    /// Errors that only affect a single object and must not abort a batch.
    pub fn is_object_local(&self) -> bool {
        matches!(self, Error::Encoding(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
