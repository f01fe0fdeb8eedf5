//! Video lookups used for tile previews.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;

use super::{ProviderError, ProviderResult, decode, http_client, require_env};

const PROVIDER: &str = "youtube";
const API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Resolves a free-text query to a video id.
///
/// Treated as unreliable: callers degrade every failure to a fallback id.
pub trait VideoResolver: Send + Sync {
    fn search(&self, query: String) -> BoxFuture<'static, ProviderResult<Option<String>>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

/// [`VideoResolver`] backed by the YouTube Data API search endpoint.
#[derive(Clone)]
pub struct YouTubeResolver {
    client: Client,
    api_key: Arc<str>,
    api_url: Arc<str>,
}

impl YouTubeResolver {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
            api_key: Arc::from(api_key.into()),
            api_url: Arc::from(API_URL),
        })
    }

    /// Build a resolver from `YOUTUBE_API_KEY`.
    pub fn from_env(timeout: Duration) -> ProviderResult<Self> {
        Self::new(require_env(PROVIDER, "YOUTUBE_API_KEY")?, timeout)
    }

    async fn first_video(&self, query: String) -> ProviderResult<Option<String>> {
        let response = self
            .client
            .get(format!("{}/search", self.api_url))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", "1"),
                ("q", query.as_str()),
                ("key", &*self.api_key),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::RequestSend {
                provider: PROVIDER,
                source,
            })?;
        let body: SearchResponse = decode(PROVIDER, response).await?;
        Ok(body.items.into_iter().find_map(|item| item.id.video_id))
    }
}

impl VideoResolver for YouTubeResolver {
    fn search(&self, query: String) -> BoxFuture<'static, ProviderResult<Option<String>>> {
        let resolver = self.clone();
        Box::pin(async move { resolver.first_video(query).await })
    }
}
