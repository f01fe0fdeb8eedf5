use std::time::Duration;

use super::error::{UpstashDaoError, UpstashResult};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime configuration describing how to reach the Upstash REST endpoint.
#[derive(Debug, Clone)]
pub struct UpstashConfig {
    pub url: String,
    pub token: String,
    pub request_timeout: Duration,
}

impl UpstashConfig {
    /// Construct a configuration from an explicit endpoint and bearer token.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build a configuration by reading `KV_REST_API_URL` and `KV_REST_API_TOKEN`.
    pub fn from_env() -> UpstashResult<Self> {
        let url = read_env("KV_REST_API_URL")?;
        let token = read_env("KV_REST_API_TOKEN")?;
        Ok(Self::new(url, token))
    }
}

fn read_env(var: &'static str) -> UpstashResult<String> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(UpstashDaoError::MissingEnvVar { var })
}
