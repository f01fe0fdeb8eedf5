//! Application-level configuration loading: game limits, cache lifetimes and matcher calibration.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TILEBEAT_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Hard cap on the roster of a single session.
    pub max_players: usize,
    /// Upper bound applied to every requested song count.
    pub max_song_count: u32,
    /// Song count used when a prompt does not name one.
    pub default_song_count: u32,
    /// Lifetime of every session-scoped key.
    pub session_ttl: Duration,
    /// Lifetime of cached preview lookups.
    pub preview_cache_ttl: Duration,
    /// Video id used whenever a preview lookup fails.
    pub fallback_video_id: String,
    /// Minimum similarity in `[0, 1]` for an answer to be accepted.
    pub match_threshold: f64,
    /// Timeout applied to every call to an external collaborator.
    pub provider_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        max_players = app_config.max_players,
                        max_song_count = app_config.max_song_count,
                        "loaded game configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Clamp a requested song count into `1..=max_song_count`.
    pub fn clamp_song_count(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_song_count.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional; missing entries keep their default value.
struct RawConfig {
    max_players: usize,
    max_song_count: u32,
    default_song_count: u32,
    session_ttl_secs: u64,
    preview_cache_ttl_secs: u64,
    fallback_video_id: String,
    match_threshold: f64,
    provider_timeout_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            max_players: 5,
            max_song_count: 50,
            default_song_count: 25,
            session_ttl_secs: 24 * 60 * 60,
            preview_cache_ttl_secs: 7 * 24 * 60 * 60,
            fallback_video_id: "dQw4w9WgXcQ".into(),
            match_threshold: 0.8,
            provider_timeout_ms: 8_000,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let max_song_count = value.max_song_count.max(1);
        Self {
            max_players: value.max_players.max(1),
            max_song_count,
            default_song_count: value.default_song_count.clamp(1, max_song_count),
            session_ttl: Duration::from_secs(value.session_ttl_secs.max(1)),
            preview_cache_ttl: Duration::from_secs(value.preview_cache_ttl_secs.max(1)),
            fallback_video_id: value.fallback_video_id,
            match_threshold: value.match_threshold.clamp(0.0, 1.0),
            provider_timeout: Duration::from_millis(value.provider_timeout_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
