pub mod gates;
pub mod session;
pub mod state_machine;
pub mod turns;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{kv::Kv, session::SessionRepository},
    error::ServiceError,
    providers::{Collaborators, PromptParser},
    services::{board::BoardBuilder, matcher::AnswerMatcher},
};

use self::gates::SessionGates;

pub type SharedState = Arc<AppState>;

#[derive(Clone, Debug)]
/// A WebSocket connection bound to one session.
pub struct Subscriber {
    pub session_id: Uuid,
    pub player_id: String,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: configuration, collaborators, the KV handle,
/// per-session gates and live sockets.
pub struct AppState {
    config: Arc<AppConfig>,
    board: BoardBuilder,
    prompt: Arc<dyn PromptParser>,
    matcher: AnswerMatcher,
    kv: RwLock<Option<Kv>>,
    degraded: watch::Sender<bool>,
    gates: SessionGates,
    subscribers: DashMap<Uuid, Subscriber>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a store is installed.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> SharedState {
        Arc::new(Self::build(config, collaborators, None))
    }

    /// Build a state with `kv` already installed.
    pub fn with_kv(config: AppConfig, collaborators: Collaborators, kv: Kv) -> SharedState {
        Arc::new(Self::build(config, collaborators, Some(kv)))
    }

    fn build(config: AppConfig, collaborators: Collaborators, kv: Option<Kv>) -> Self {
        let (degraded_tx, _rx) = watch::channel(kv.is_none());
        let board = BoardBuilder::new(collaborators.catalog, collaborators.videos, &config);
        Self {
            matcher: AnswerMatcher::new(config.match_threshold),
            prompt: collaborators.prompt,
            board,
            config: Arc::new(config),
            kv: RwLock::new(kv),
            degraded: degraded_tx,
            gates: SessionGates::default(),
            subscribers: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn board(&self) -> &BoardBuilder {
        &self.board
    }

    pub fn prompt_parser(&self) -> &dyn PromptParser {
        self.prompt.as_ref()
    }

    pub fn matcher(&self) -> AnswerMatcher {
        self.matcher
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn kv(&self) -> Option<Kv> {
        self.kv.read().await.clone()
    }

    /// Current store, or [`ServiceError::Degraded`] while none is usable.
    pub async fn require_kv(&self) -> Result<Kv, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.kv().await.ok_or(ServiceError::Degraded)
    }

    /// Session repository over the current store.
    pub async fn sessions(&self) -> Result<SessionRepository, ServiceError> {
        let kv = self.require_kv().await?;
        Ok(SessionRepository::new(kv, self.config.session_ttl))
    }

    /// Install a new store and leave degraded mode.
    pub async fn install_kv(&self, kv: Kv) {
        {
            let mut guard = self.kv.write().await;
            *guard = Some(kv);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_kv(&self) {
        {
            let mut guard = self.kv.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Mutual exclusion for session mutations.
    pub fn gates(&self) -> &SessionGates {
        &self.gates
    }

    /// Live WebSocket subscriptions keyed by connection id.
    pub fn subscribers(&self) -> &DashMap<Uuid, Subscriber> {
        &self.subscribers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::kv::memory::MemoryKvStore;

    #[tokio::test]
    async fn starts_degraded_until_store_installed() {
        let state = AppState::new(AppConfig::default(), Collaborators::unconfigured());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_kv().await,
            Err(ServiceError::Degraded)
        ));

        let mut watcher = state.degraded_watcher();
        state
            .install_kv(Kv::new(Arc::new(MemoryKvStore::default())))
            .await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_kv().await.is_ok());

        state.clear_kv().await;
        assert!(state.is_degraded());
        assert!(state.kv().await.is_none());
    }

    #[tokio::test]
    async fn degraded_flag_blocks_installed_store() {
        let state = AppState::with_kv(
            AppConfig::default(),
            Collaborators::unconfigured(),
            Kv::new(Arc::new(MemoryKvStore::default())),
        );
        state.update_degraded(true);
        assert!(matches!(
            state.require_kv().await,
            Err(ServiceError::Degraded)
        ));
    }
}
