use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether sessions can currently be served, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_kv().await {
        Ok(kv) => match kv.health_check().await {
            Ok(()) => HealthResponse::ok(kv.backend()),
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                HealthResponse::degraded()
            }
        },
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::kv::{Kv, memory::MemoryKvStore},
        providers::Collaborators,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default(), Collaborators::unconfigured());
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert!(health.store.is_none());
    }

    #[tokio::test]
    async fn reports_backend_when_healthy() {
        let state = AppState::with_kv(
            AppConfig::default(),
            Collaborators::unconfigured(),
            Kv::new(Arc::new(MemoryKvStore::new())),
        );
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.store.as_deref(), Some("memory"));
    }
}
