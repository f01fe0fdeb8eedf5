//! Board assembly: track acquisition, preview resolution and difficulty tiering.

use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    dao::kv::Kv,
    error::ServiceError,
    providers::{Catalog, Track, VideoResolver, catalog::compose_query},
    state::session::{Difficulty, GameParams, Tile},
};

/// Preview lookups running at the same time during board creation.
const LOOKUP_CONCURRENCY: usize = 5;
const EMBED_URL_PREFIX: &str = "https://www.youtube.com/embed/";

/// Cache key of the video id resolved for a track.
pub fn preview_key(track_id: &str) -> String {
    format!("preview:{track_id}")
}

/// Embeddable player URL of a video.
pub fn embed_url(video_id: &str) -> String {
    format!("{EMBED_URL_PREFIX}{video_id}")
}

/// Turns a parameter set into an ordered list of tiles.
#[derive(Clone)]
pub struct BoardBuilder {
    catalog: Arc<dyn Catalog>,
    videos: Arc<dyn VideoResolver>,
    fallback_video_id: String,
    preview_ttl: Duration,
}

impl BoardBuilder {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        videos: Arc<dyn VideoResolver>,
        config: &AppConfig,
    ) -> Self {
        Self {
            catalog,
            videos,
            fallback_video_id: config.fallback_video_id.clone(),
            preview_ttl: config.preview_cache_ttl,
        }
    }

    /// Acquire tracks and resolve their previews. No session lock may be held here.
    pub async fn build(&self, kv: &Kv, params: &GameParams) -> Result<Vec<Tile>, ServiceError> {
        let tracks = self.acquire(params).await?;
        let previews = stream::iter(tracks.iter().cloned())
            .map(|track| {
                let (builder, kv) = (self.clone(), kv.clone());
                async move { builder.resolve_preview(&kv, &track).await }
            })
            .buffered(LOOKUP_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        Ok(assign_tiles(tracks.into_iter().zip(previews).collect()))
    }

    async fn acquire(&self, params: &GameParams) -> Result<Vec<Track>, ServiceError> {
        let query = compose_query(params).ok_or_else(|| {
            ServiceError::Validation(
                "at least one artist, genre, decade or mood is required".into(),
            )
        })?;

        let tracks = self
            .catalog
            .search(query.clone(), params.limit)
            .await
            .map_err(|err| {
                warn!(query = %query, error = %err, "catalog search failed");
                ServiceError::Acquisition(err.to_string())
            })?;

        let mut seen = HashSet::new();
        let tracks = tracks
            .into_iter()
            .filter(|track| seen.insert(track.id.clone()))
            .take(params.limit as usize)
            .collect::<Vec<_>>();

        if tracks.is_empty() {
            return Err(ServiceError::Acquisition(format!(
                "no tracks found for `{query}`"
            )));
        }
        debug!(query = %query, count = tracks.len(), "acquired tracks");
        Ok(tracks)
    }

    /// Cache-first lookup of the preview video of a track. Never fails.
    async fn resolve_preview(&self, kv: &Kv, track: &Track) -> String {
        let key = preview_key(&track.id);
        match kv.get(&key).await {
            Ok(Some(video_id)) => return embed_url(&video_id),
            Ok(None) => {}
            Err(err) => warn!(track_id = %track.id, error = %err, "preview cache read failed"),
        }

        let query = format!("{} {}", track.title, track.artist);
        let video_id = match self.videos.search(query).await {
            Ok(Some(video_id)) if !video_id.is_empty() => video_id,
            Ok(_) => {
                warn!(track_id = %track.id, "no preview video found; using fallback");
                self.fallback_video_id.clone()
            }
            Err(err) => {
                warn!(track_id = %track.id, error = %err, "preview lookup failed; using fallback");
                self.fallback_video_id.clone()
            }
        };

        if let Err(err) = kv.set(&key, video_id.clone(), Some(self.preview_ttl)).await {
            warn!(track_id = %track.id, error = %err, "preview cache write failed");
        }
        embed_url(&video_id)
    }
}

/// Sort by popularity ascending and split into five positional buckets.
///
/// Bucket size is `ceil(n / 5)`; the last bucket may be shorter. Bucket `i`
/// gets tier `i` and `5 * (i + 1)` points.
pub fn assign_tiles(mut entries: Vec<(Track, String)>) -> Vec<Tile> {
    entries.sort_by_key(|(track, _)| track.popularity);
    let bucket_size = entries.len().div_ceil(Difficulty::TIERS.len()).max(1);

    entries
        .into_iter()
        .enumerate()
        .map(|(index, (track, preview_url))| {
            let difficulty = Difficulty::from_bucket(index / bucket_size);
            Tile {
                id: track.id,
                title: track.title,
                artist: track.artist,
                preview_url,
                difficulty,
                points: difficulty.points(),
                answered_by: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::kv::memory::MemoryKvStore,
        providers::testing::{StubCatalog, StubResolver, tracks},
    };

    fn kv() -> Kv {
        Kv::new(Arc::new(MemoryKvStore::new()))
    }

    fn params(limit: u32) -> GameParams {
        GameParams {
            genres: vec!["pop".into()],
            limit,
            ..GameParams::default()
        }
    }

    fn with_previews(tracks: Vec<Track>) -> Vec<(Track, String)> {
        tracks
            .into_iter()
            .map(|track| (track, "https://www.youtube.com/embed/x".to_string()))
            .collect()
    }

    #[test]
    fn twenty_five_tracks_fill_five_equal_tiers() {
        let tiles = assign_tiles(with_previews(tracks(25)));
        assert_eq!(tiles.len(), 25);
        for tile in &tiles[0..5] {
            assert_eq!(tile.difficulty, Difficulty::VeryEasy);
            assert_eq!(tile.points, 5);
        }
        for tile in &tiles[20..25] {
            assert_eq!(tile.difficulty, Difficulty::VeryHard);
            assert_eq!(tile.points, 25);
        }
    }

    #[test]
    fn tiles_are_sorted_by_popularity_ascending() {
        let tiles = assign_tiles(with_previews(tracks(10)));
        // Stub popularity decreases with the index, so the last track comes first.
        assert_eq!(tiles[0].id, "track-9");
        assert_eq!(tiles[9].id, "track-0");
    }

    #[test]
    fn uneven_counts_use_ceiling_bucket_size() {
        let tiles = assign_tiles(with_previews(tracks(12)));
        let points = tiles.iter().map(|tile| tile.points).collect::<Vec<_>>();
        assert_eq!(points, vec![5, 5, 5, 10, 10, 10, 15, 15, 15, 20, 20, 20]);

        let tiles = assign_tiles(with_previews(tracks(3)));
        let tiers = tiles.iter().map(|tile| tile.difficulty).collect::<Vec<_>>();
        assert_eq!(
            tiers,
            vec![Difficulty::VeryEasy, Difficulty::Easy, Difficulty::Medium]
        );
    }

    #[tokio::test]
    async fn failed_lookups_fall_back_and_are_cached() {
        let kv = kv();
        let resolver = StubResolver::new([("Song 0 Artist 0".to_string(), "vid0".to_string())]);
        let builder = BoardBuilder::new(
            StubCatalog::new(tracks(2)),
            resolver.clone(),
            &AppConfig::default(),
        );

        let tiles = builder.build(&kv, &params(2)).await.unwrap();
        let url_of = |id: &str| {
            tiles
                .iter()
                .find(|tile| tile.id == id)
                .map(|tile| tile.preview_url.clone())
        };
        assert_eq!(
            url_of("track-0").as_deref(),
            Some("https://www.youtube.com/embed/vid0")
        );
        assert_eq!(
            url_of("track-1").as_deref(),
            Some("https://www.youtube.com/embed/dQw4w9WgXcQ")
        );
        assert_eq!(
            kv.get(&preview_key("track-1")).await.unwrap().as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(resolver.calls(), 2);

        builder.build(&kv, &params(2)).await.unwrap();
        assert_eq!(resolver.calls(), 2, "second build must be served from cache");
    }

    #[tokio::test]
    async fn build_runs_on_spawned_tasks() {
        let builder = BoardBuilder::new(
            StubCatalog::new(tracks(12)),
            StubResolver::new([]),
            &AppConfig::default(),
        );
        let kv = kv();
        let tiles = tokio::spawn(async move { builder.build(&kv, &params(12)).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tiles.len(), 12);
    }

    #[tokio::test]
    async fn zero_tracks_is_an_acquisition_error() {
        let builder = BoardBuilder::new(
            StubCatalog::new(Vec::new()),
            StubResolver::new([]),
            &AppConfig::default(),
        );
        let err = builder.build(&kv(), &params(5)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Acquisition(_)));
    }

    #[tokio::test]
    async fn filterless_params_are_rejected_before_searching() {
        let catalog = StubCatalog::new(tracks(5));
        let builder = BoardBuilder::new(
            catalog.clone(),
            StubResolver::new([]),
            &AppConfig::default(),
        );
        let err = builder
            .build(
                &kv(),
                &GameParams {
                    limit: 5,
                    ..GameParams::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(catalog.queries().is_empty());
    }
}
