//! Error types shared by the Upstash storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`UpstashDaoError`] failures.
pub type UpstashResult<T> = Result<T, UpstashDaoError>;

/// Failures that can occur while talking to the Upstash REST API.
#[derive(Debug, Error)]
pub enum UpstashDaoError {
    /// Required environment variable is missing.
    #[error("missing Upstash environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Upstash client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request for a command could not be sent.
    #[error("failed to send Upstash request for {command}")]
    RequestSend {
        command: String,
        #[source]
        source: reqwest::Error,
    },
    /// Upstash returned an unexpected HTTP status.
    #[error("unexpected Upstash response status {status} for {command}")]
    RequestStatus { command: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode Upstash response for {command}")]
    DecodeResponse {
        command: String,
        #[source]
        source: reqwest::Error,
    },
    /// Upstash executed the request but the command itself failed.
    #[error("Upstash rejected {command}: {message}")]
    CommandFailed { command: String, message: String },
}

impl From<UpstashDaoError> for StorageError {
    fn from(err: UpstashDaoError) -> Self {
        StorageError::unavailable("upstash".into(), err)
    }
}
