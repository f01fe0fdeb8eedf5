use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod extract;
pub mod health;
pub mod session;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .merge(session::router())
        .merge(docs::router())
        .with_state(state)
}
