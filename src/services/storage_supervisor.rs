use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{kv::Kv, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECOVERY_ATTEMPTS: u32 = 3;

/// Connect to the KV backend and keep the shared state in degraded mode while it is unavailable.
///
/// Runs forever; spawn it on the runtime.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Kv, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(kv) => {
                info!(backend = kv.backend(), "storage connection established; leaving degraded mode");
                state.install_kv(kv.clone()).await;
                delay = INITIAL_DELAY;

                watch(&state, &kv).await;

                warn!("exhausted storage recovery attempts; reconnecting");
                state.clear_kv().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll `kv` until it stays unhealthy for [`MAX_RECOVERY_ATTEMPTS`] checks in a row.
async fn watch(state: &SharedState, kv: &Kv) {
    loop {
        if kv.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        if !recover(state, kv).await {
            return;
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Retry the health check with backoff; degraded mode starts at the first failure.
async fn recover(state: &SharedState, kv: &Kv) -> bool {
    let mut retry_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECOVERY_ATTEMPTS {
        match kv.health_check().await {
            Ok(()) => {
                info!(attempt, "storage recovered after health check failure");
                state.update_degraded(false);
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage health check failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage recovery attempt failed");
                }
                sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::kv::memory::MemoryKvStore, providers::Collaborators,
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn installs_the_store_once_connected() {
        let state = AppState::new(AppConfig::default(), Collaborators::unconfigured());
        let mut watcher = state.degraded_watcher();
        let mut failures = 2;

        let supervisor = tokio::spawn(run(state.clone(), move || {
            let outcome = if failures > 0 {
                failures -= 1;
                Err(StorageError::UnexpectedReply { command: "PING" })
            } else {
                Ok(Kv::new(Arc::new(MemoryKvStore::new())))
            };
            async move { outcome }
        }));

        watcher.changed().await.unwrap();
        assert!(!*watcher.borrow());
        assert!(state.require_kv().await.is_ok());
        supervisor.abort();
    }
}
