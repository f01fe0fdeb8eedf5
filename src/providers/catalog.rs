//! Track catalog backed by the Spotify Web API.

use std::{env, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

use crate::state::session::GameParams;

use super::{ProviderError, ProviderResult, decode, http_client, require_env};

const PROVIDER: &str = "spotify";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_URL: &str = "https://api.spotify.com";
/// Largest page the search endpoint serves.
const PAGE_SIZE: usize = 50;
/// Tokens are refreshed this long before the issuer's expiry.
const TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Track returned by a catalog search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Primary artist.
    pub artist: String,
    /// Popularity on a 0-100 scale; higher is better known.
    pub popularity: u8,
}

/// Source of tracks for new boards.
pub trait Catalog: Send + Sync {
    /// Return up to `limit` tracks matching `query`, paging as needed.
    fn search(&self, query: String, limit: u32) -> BoxFuture<'static, ProviderResult<Vec<Track>>>;
}

/// Compose the catalog query for a parameter set.
///
/// Values inside one filter are alternatives (`OR`); filters are combined with
/// a space, which the catalog treats as `AND`. Empty filters are left out
/// entirely and moods are appended as free text. Returns `None` when nothing
/// usable remains.
pub fn compose_query(params: &GameParams) -> Option<String> {
    let mut parts = Vec::new();

    let clauses = [
        any_of(params.artists.iter().map(|artist| quoted("artist", artist))),
        any_of(params.genres.iter().map(|genre| quoted("genre", genre))),
        any_of(params.decades.iter().filter_map(|decade| decade_range(decade))),
    ];
    parts.extend(clauses.into_iter().flatten());

    let moods = params
        .moods
        .iter()
        .map(|mood| unquote(mood))
        .filter(|mood| !mood.is_empty())
        .collect::<Vec<_>>();
    if !moods.is_empty() {
        parts.push(moods.join(" "));
    }

    (!parts.is_empty()).then(|| parts.join(" "))
}

fn any_of(clauses: impl Iterator<Item = String>) -> Option<String> {
    let clauses = clauses.collect::<Vec<_>>();
    (!clauses.is_empty()).then(|| clauses.join(" OR "))
}

fn quoted(field: &str, value: &str) -> String {
    format!("{field}:\"{}\"", unquote(value))
}

fn unquote(value: &str) -> String {
    value.replace('"', "").trim().to_string()
}

/// Turn `1980s`, `1985`, `80s` or `'90s` into a `year:` range clause.
fn decade_range(decade: &str) -> Option<String> {
    let digits = decade
        .trim()
        .trim_start_matches('\'')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    let year = digits.parse::<u32>().ok()?;
    let start = match digits.len() {
        4 => year - year % 10,
        2 if year < 30 => 2000 + year - year % 10,
        2 => 1900 + year - year % 10,
        _ => return None,
    };
    Some(format!("year:{start}-{}", start + 9))
}

/// Credentials and endpoints of the Spotify Web API.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub api_url: String,
}

impl SpotifyConfig {
    /// Read `SPOTIFY_CLIENT_ID`/`SPOTIFY_CLIENT_SECRET`; endpoints default to the public API.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            client_id: require_env(PROVIDER, "SPOTIFY_CLIENT_ID")?,
            client_secret: require_env(PROVIDER, "SPOTIFY_CLIENT_SECRET")?,
            auth_url: env::var("SPOTIFY_AUTH_URL").unwrap_or_else(|_| DEFAULT_AUTH_URL.into()),
            api_url: env::var("SPOTIFY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
        })
    }
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    popularity: u8,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

impl From<SpotifyTrack> for Track {
    fn from(track: SpotifyTrack) -> Self {
        let artist = track
            .artists
            .into_iter()
            .next()
            .map(|artist| artist.name)
            .unwrap_or_else(|| "Unknown Artist".into());
        Self {
            id: track.id,
            title: track.name,
            artist,
            popularity: track.popularity.min(100),
        }
    }
}

/// [`Catalog`] using the client-credentials flow of the Spotify Web API.
#[derive(Clone)]
pub struct SpotifyCatalog {
    client: Client,
    config: Arc<SpotifyConfig>,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl SpotifyCatalog {
    pub fn new(config: SpotifyConfig, timeout: Duration) -> ProviderResult<Self> {
        Ok(Self {
            client: http_client(PROVIDER, timeout)?,
            config: Arc::new(SpotifyConfig {
                auth_url: config.auth_url.trim_end_matches('/').to_string(),
                api_url: config.api_url.trim_end_matches('/').to_string(),
                ..config
            }),
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Return the cached access token, fetching a new one when it is about to expire.
    async fn access_token(&self) -> ProviderResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|token| Instant::now() < token.refresh_at)
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(&self.config.auth_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::RequestSend {
                provider: PROVIDER,
                source,
            })?;
        let token: TokenResponse = decode(PROVIDER, response).await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SAFETY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn search_page(&self, query: &str, limit: usize, offset: usize) -> ProviderResult<TrackPage> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}/v1/search", self.config.api_url))
            .bearer_auth(token)
            .query(&[
                ("q", query.to_string()),
                ("type", "track".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(|source| ProviderError::RequestSend {
                provider: PROVIDER,
                source,
            })?;
        let page: SearchResponse = decode(PROVIDER, response).await?;
        Ok(page.tracks)
    }

    async fn search_tracks(&self, query: String, limit: u32) -> ProviderResult<Vec<Track>> {
        let limit = limit as usize;
        let mut collected = Vec::with_capacity(limit);
        let mut offset = 0;

        while collected.len() < limit {
            let wanted = (limit - collected.len()).min(PAGE_SIZE);
            let page = self.search_page(&query, wanted, offset).await?;
            let received = page.items.len();
            collected.extend(page.items.into_iter().map(Track::from));
            debug!(query = %query, offset, received, "fetched catalog page");

            if page.next.is_none() || received == 0 {
                break;
            }
            offset += received;
        }

        collected.truncate(limit);
        Ok(collected)
    }
}

impl Catalog for SpotifyCatalog {
    fn search(&self, query: String, limit: u32) -> BoxFuture<'static, ProviderResult<Vec<Track>>> {
        let catalog = self.clone();
        Box::pin(async move { catalog.search_tracks(query, limit).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GameParams {
        GameParams {
            limit: 10,
            ..GameParams::default()
        }
    }

    #[test]
    fn absent_filters_are_omitted() {
        let query = compose_query(&GameParams {
            genres: vec!["pop".into()],
            ..params()
        });
        assert_eq!(query.as_deref(), Some("genre:\"pop\""));
        assert_eq!(compose_query(&params()), None);
    }

    #[test]
    fn filters_combine_with_or_inside_and_space_between() {
        let query = compose_query(&GameParams {
            artists: vec!["the weeknd".into(), "taylor swift".into()],
            decades: vec!["1980s".into(), "90s".into()],
            moods: vec!["happy".into(), "energetic".into()],
            ..params()
        });
        assert_eq!(
            query.as_deref(),
            Some(
                "artist:\"the weeknd\" OR artist:\"taylor swift\" \
                 year:1980-1989 OR year:1990-1999 happy energetic"
            )
        );
    }

    #[test]
    fn decades_are_normalized_or_dropped() {
        assert_eq!(decade_range("1985").as_deref(), Some("year:1980-1989"));
        assert_eq!(decade_range("'00s").as_deref(), Some("year:2000-2009"));
        assert_eq!(decade_range("2010s").as_deref(), Some("year:2010-2019"));
        assert_eq!(decade_range("eighties"), None);

        let query = compose_query(&GameParams {
            decades: vec!["eighties".into()],
            ..params()
        });
        assert_eq!(query, None);
    }

    #[test]
    fn quotes_cannot_break_out_of_a_clause() {
        let query = compose_query(&GameParams {
            artists: vec!["ac\"dc".into()],
            ..params()
        });
        assert_eq!(query.as_deref(), Some("artist:\"acdc\""));
    }

    #[test]
    fn tracks_fall_back_to_unknown_artist() {
        let raw = serde_json::json!({ "id": "t1", "name": "Song", "artists": [], "popularity": 42 });
        let track = Track::from(serde_json::from_value::<SpotifyTrack>(raw).unwrap());
        assert_eq!(track.artist, "Unknown Artist");
        assert_eq!(track.popularity, 42);
    }
}
