use lapis_types::Pid;

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the identifier.
    #[error("identifier not found: {0}")]
    NotFound(Pid),

    /// The identifier is already taken.
    #[error("identifier already exists: {0}")]
    AlreadyExists(Pid),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend is in an unusable state (e.g. a poisoned lock).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
