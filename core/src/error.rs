pub type Result<T, E = PersistError> = std::result::Result<T, E>;

/// Failure of a backing key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("stored value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure while moving the corpus to or from its store.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("could not encode corpus: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("corrupt corpus payload: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("unsupported corpus version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid corpus entry {document_id}: {reason}")]
    Invalid { document_id: String, reason: String },

    #[error("corpus payload of {size} bytes exceeds the {limit} byte limit")]
    CapacityExceeded { size: usize, limit: usize },
}
