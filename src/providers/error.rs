//! Error types shared by the external collaborators.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`ProviderError`] failures.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failures that can occur while talking to an external service.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Required environment variable is missing.
    #[error("{provider} is not configured: missing environment variable `{var}`")]
    MissingEnvVar {
        provider: &'static str,
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build {provider} client")]
    ClientBuilder {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or timed out.
    #[error("failed to send {provider} request")]
    RequestSend {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The service answered with a non-success status.
    #[error("unexpected {provider} response status {status}")]
    RequestStatus {
        provider: &'static str,
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode {provider} response")]
    DecodeResponse {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The payload decoded but does not carry what was asked for.
    #[error("{provider} returned an unusable payload: {message}")]
    Payload {
        provider: &'static str,
        message: String,
    },
}
