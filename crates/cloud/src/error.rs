/// Errors from blob-store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// No blob (or no blob under a prefix) with this name.
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The blob name is empty or escapes the store root.
    #[error("Invalid blob name '{0}'")]
    InvalidName(String),

    /// A caller-supplied argument is missing or malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage backend (S3 SDK, etc.) reported a failure.
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BlobError {
    /// Whether retrying the same call could succeed.
    ///
    /// Lookups of missing blobs and malformed requests fail the same way
    /// every time; I/O and backend failures may be transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Backend(_))
    }
}
