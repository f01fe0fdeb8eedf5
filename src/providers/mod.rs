//! External collaborators: track catalog, video resolver and prompt parser.
//!
//! Each one sits behind a small trait so the session engine can be exercised
//! with in-process stubs. Implementations are picked once at startup.

pub mod catalog;
pub mod error;
pub mod prompt;
pub mod video;

#[cfg(test)]
pub mod testing;

use std::{env, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Response};
use tracing::warn;

pub use self::{
    catalog::{Catalog, SpotifyCatalog, SpotifyConfig, Track},
    error::{ProviderError, ProviderResult},
    prompt::{GeminiPromptParser, ParsedPrompt, PromptParser},
    video::{VideoResolver, YouTubeResolver},
};

/// Collaborators picked at startup and shared by every request.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub videos: Arc<dyn VideoResolver>,
    pub prompt: Arc<dyn PromptParser>,
}

impl Collaborators {
    /// Build every collaborator from the environment, standing in [`Unconfigured`]
    /// for those whose credentials are missing.
    pub fn from_env(timeout: Duration) -> Self {
        let catalog: Arc<dyn Catalog> = match SpotifyConfig::from_env()
            .and_then(|config| SpotifyCatalog::new(config, timeout))
        {
            Ok(catalog) => Arc::new(catalog),
            Err(err) => {
                warn!(error = %err, "catalog disabled");
                Arc::new(Unconfigured {
                    provider: "spotify",
                    var: "SPOTIFY_CLIENT_ID",
                })
            }
        };
        let videos: Arc<dyn VideoResolver> = match YouTubeResolver::from_env(timeout) {
            Ok(resolver) => Arc::new(resolver),
            Err(err) => {
                warn!(error = %err, "video lookups disabled; previews use the fallback");
                Arc::new(Unconfigured {
                    provider: "youtube",
                    var: "YOUTUBE_API_KEY",
                })
            }
        };
        let prompt: Arc<dyn PromptParser> = match GeminiPromptParser::from_env(timeout) {
            Ok(parser) => Arc::new(parser),
            Err(err) => {
                warn!(error = %err, "prompt parser disabled");
                Arc::new(Unconfigured {
                    provider: "gemini",
                    var: "GOOGLE_AI_API_KEY",
                })
            }
        };
        Self {
            catalog,
            videos,
            prompt,
        }
    }

    /// Collaborators that fail every call.
    pub fn unconfigured() -> Self {
        Self {
            catalog: Arc::new(Unconfigured {
                provider: "spotify",
                var: "SPOTIFY_CLIENT_ID",
            }),
            videos: Arc::new(Unconfigured {
                provider: "youtube",
                var: "YOUTUBE_API_KEY",
            }),
            prompt: Arc::new(Unconfigured {
                provider: "gemini",
                var: "GOOGLE_AI_API_KEY",
            }),
        }
    }
}

/// Stand-in used when the credentials of a collaborator are absent.
///
/// Every call fails with [`ProviderError::MissingEnvVar`], which the engine
/// degrades exactly like any other collaborator failure.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured {
    pub provider: &'static str,
    pub var: &'static str,
}

impl Unconfigured {
    fn error(&self) -> ProviderError {
        ProviderError::MissingEnvVar {
            provider: self.provider,
            var: self.var,
        }
    }
}

impl Catalog for Unconfigured {
    fn search(&self, _query: String, _limit: u32) -> BoxFuture<'static, ProviderResult<Vec<Track>>> {
        let err = self.error();
        Box::pin(async move { Err(err) })
    }
}

impl VideoResolver for Unconfigured {
    fn search(&self, _query: String) -> BoxFuture<'static, ProviderResult<Option<String>>> {
        let err = self.error();
        Box::pin(async move { Err(err) })
    }
}

impl PromptParser for Unconfigured {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    fn parse(&self, _prompt: String) -> BoxFuture<'static, ProviderResult<ParsedPrompt>> {
        let err = self.error();
        Box::pin(async move { Err(err) })
    }
}

/// Read a required environment variable.
fn require_env(provider: &'static str, var: &'static str) -> ProviderResult<String> {
    env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ProviderError::MissingEnvVar { provider, var })
}

/// HTTP client with the per-call timeout applied.
fn http_client(provider: &'static str, timeout: Duration) -> ProviderResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| ProviderError::ClientBuilder { provider, source })
}

/// Reject non-success responses and decode the JSON body.
async fn decode<T>(provider: &'static str, response: Response) -> ProviderResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::RequestStatus { provider, status });
    }
    response
        .json::<T>()
        .await
        .map_err(|source| ProviderError::DecodeResponse { provider, source })
}
