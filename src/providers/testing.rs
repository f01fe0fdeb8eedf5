//! In-process collaborators for tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::future::BoxFuture;

use super::{
    Catalog, ParsedPrompt, PromptParser, ProviderError, ProviderResult, Track, VideoResolver,
};

/// Build `count` tracks whose popularity decreases with their index.
pub fn tracks(count: usize) -> Vec<Track> {
    (0..count)
        .map(|index| Track {
            id: format!("track-{index}"),
            title: format!("Song {index}"),
            artist: format!("Artist {index}"),
            popularity: u8::try_from(100 - index.min(100)).unwrap_or(0),
        })
        .collect()
}

fn stub_failure(provider: &'static str) -> ProviderError {
    ProviderError::Payload {
        provider,
        message: "stubbed failure".into(),
    }
}

/// Catalog serving a fixed list and recording every query.
#[derive(Default)]
pub struct StubCatalog {
    tracks: Vec<Track>,
    queries: Mutex<Vec<(String, u32)>>,
}

impl StubCatalog {
    pub fn new(tracks: Vec<Track>) -> Arc<Self> {
        Arc::new(Self {
            tracks,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<(String, u32)> {
        self.queries.lock().unwrap().clone()
    }
}

impl Catalog for StubCatalog {
    fn search(&self, query: String, limit: u32) -> BoxFuture<'static, ProviderResult<Vec<Track>>> {
        self.queries.lock().unwrap().push((query, limit));
        let tracks = self
            .tracks
            .iter()
            .take(limit as usize)
            .cloned()
            .collect::<Vec<_>>();
        Box::pin(async move { Ok(tracks) })
    }
}

/// Resolver answering from a fixed table; unknown queries fail.
#[derive(Default)]
pub struct StubResolver {
    videos: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StubResolver {
    pub fn new(videos: impl IntoIterator<Item = (String, String)>) -> Arc<Self> {
        Arc::new(Self {
            videos: videos.into_iter().collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VideoResolver for StubResolver {
    fn search(&self, query: String) -> BoxFuture<'static, ProviderResult<Option<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let found = self.videos.get(&query).cloned();
        Box::pin(async move { found.map(Some).ok_or_else(|| stub_failure("stub-video")) })
    }
}

/// Parser returning a canned answer, or failing when none is set.
pub struct StubParser {
    reply: Option<ParsedPrompt>,
}

impl StubParser {
    pub fn answering(reply: ParsedPrompt) -> Arc<Self> {
        Arc::new(Self { reply: Some(reply) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { reply: None })
    }
}

impl PromptParser for StubParser {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn parse(&self, _prompt: String) -> BoxFuture<'static, ProviderResult<ParsedPrompt>> {
        let reply = self.reply.clone();
        Box::pin(async move { reply.ok_or_else(|| stub_failure("stub-parser")) })
    }
}
