use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-session mutual exclusion for every mutating action.
///
/// At most one mutation per session id is in flight inside this process. A
/// gate exists only while someone holds or waits for it.
#[derive(Debug, Default)]
pub struct SessionGates {
    gates: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl SessionGates {
    /// Wait for exclusive access to `session_id`.
    pub async fn lock(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let gate = Arc::clone(&self.gates.entry(session_id).or_default());
        gate.lock_owned().await
    }

    /// Run `work` while holding the gate of `session_id`, then release it.
    pub async fn run<F, Fut, T>(&self, session_id: Uuid, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.lock(session_id).await;
        let outcome = work().await;
        drop(guard);
        self.retire(session_id);
        outcome
    }

    /// Forget the gate of `session_id` when nobody holds or awaits it.
    pub fn retire(&self, session_id: Uuid) {
        self.gates
            .remove_if(&session_id, |_, gate| Arc::strong_count(gate) == 1);
    }

    /// Number of gates currently tracked.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}
