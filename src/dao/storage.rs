use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by KV backends regardless of the underlying transport.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A key holds a value of another type than the command expects.
    #[error("wrong value type stored at `{key}` for {command}")]
    WrongType { key: String, command: &'static str },
    /// The backend answered with a reply shape the command cannot produce.
    #[error("unexpected reply to {command}")]
    UnexpectedReply { command: &'static str },
    /// A stored record could not be decoded.
    #[error("corrupted record at `{key}`")]
    Corrupted {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
