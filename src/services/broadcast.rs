//! Fan-out of session events to the WebSocket connections bound to a session.

use axum::extract::ws::Message;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{PlayerPresence, ServerMessage},
    services::session_service::to_view,
    state::{AppState, Subscriber, session::Session},
};

/// Event emitted after a session change has been persisted.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    GameStateUpdate(&'a Session),
    GameStarted(&'a Session),
    PlayerJoined { player_id: &'a str, name: &'a str },
    PlayerLeft { player_id: &'a str },
}

impl Notification<'_> {
    /// Frame for one subscriber; views are stamped with the viewer's id.
    fn render(&self, session_id: Uuid, viewer: &str) -> ServerMessage {
        match *self {
            Notification::GameStateUpdate(session) => {
                ServerMessage::GameStateUpdate(to_view(session, viewer))
            }
            Notification::GameStarted(session) => ServerMessage::GameStarted(to_view(session, viewer)),
            Notification::PlayerJoined { player_id, name } => {
                ServerMessage::PlayerJoined(PlayerPresence {
                    game_id: session_id,
                    player_id: player_id.to_string(),
                    name: Some(name.to_string()),
                })
            }
            Notification::PlayerLeft { player_id } => ServerMessage::PlayerLeft(PlayerPresence {
                game_id: session_id,
                player_id: player_id.to_string(),
                name: None,
            }),
        }
    }
}

/// Bind connection `conn_id`, returning the binding it replaces.
///
/// A replaced binding is announced as `player-left` to its former session,
/// unless the connection re-binds the same player to the same session.
pub fn subscribe(state: &AppState, conn_id: Uuid, subscriber: Subscriber) -> Option<Subscriber> {
    let (session_id, player_id) = (subscriber.session_id, subscriber.player_id.clone());
    let replaced = state.subscribers().insert(conn_id, subscriber);
    let moved = replaced
        .as_ref()
        .filter(|previous| previous.session_id != session_id || previous.player_id != player_id);
    if let Some(previous) = moved {
        broadcast(
            state,
            previous.session_id,
            Notification::PlayerLeft {
                player_id: &previous.player_id,
            },
        );
    }
    replaced
}

/// Drop the binding of `conn_id` and announce the departure.
pub fn unsubscribe(state: &AppState, conn_id: Uuid) -> Option<Subscriber> {
    let (_, removed) = state.subscribers().remove(&conn_id)?;
    broadcast(
        state,
        removed.session_id,
        Notification::PlayerLeft {
            player_id: &removed.player_id,
        },
    );
    Some(removed)
}

/// Best-effort delivery to every subscriber of `session_id`.
///
/// A failed send removes that subscriber only. Returns the number of frames delivered.
pub fn broadcast(state: &AppState, session_id: Uuid, notification: Notification<'_>) -> usize {
    // Snapshot first so no map shard stays locked while removing dead connections.
    let targets = state
        .subscribers()
        .iter()
        .filter(|entry| entry.session_id == session_id)
        .map(|entry| (*entry.key(), entry.value().clone()))
        .collect::<Vec<_>>();

    let mut delivered = 0;
    for (conn_id, subscriber) in targets {
        let frame = notification.render(session_id, &subscriber.player_id);
        let payload = match serde_json::to_string(&frame) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "failed to serialize broadcast frame");
                continue;
            }
        };
        if subscriber.tx.send(Message::Text(payload.into())).is_err() {
            debug!(session_id = %session_id, conn_id = %conn_id, "dropping closed subscriber");
            state.subscribers().remove(&conn_id);
        } else {
            delivered += 1;
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{config::AppConfig, providers::Collaborators, state::SharedState};

    fn state() -> SharedState {
        AppState::new(AppConfig::default(), Collaborators::unconfigured())
    }

    fn bind(
        state: &AppState,
        session_id: Uuid,
        player_id: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();
        subscribe(
            state,
            conn_id,
            Subscriber {
                session_id,
                player_id: player_id.into(),
                tx,
            },
        );
        (conn_id, rx)
    }

    fn next_frame(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        match rx.try_recv().unwrap() {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn views_are_stamped_per_subscriber() {
        let state = state();
        let session = Session::new("p1", "Ada", Vec::new());
        let (_, mut rx1) = bind(&state, session.id, "p1");
        let (_, mut rx2) = bind(&state, session.id, "p2");
        let (_, mut other) = bind(&state, Uuid::new_v4(), "p3");

        let delivered = broadcast(&state, session.id, Notification::GameStateUpdate(&session));
        assert_eq!(delivered, 2);
        assert_eq!(next_frame(&mut rx1)["payload"]["playerId"], "p1");
        let frame = next_frame(&mut rx2);
        assert_eq!(frame["type"], "game-state-update");
        assert_eq!(frame["payload"]["playerId"], "p2");
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn failed_send_only_drops_that_subscriber() {
        let state = state();
        let id = Uuid::new_v4();
        let (dead, rx_dead) = bind(&state, id, "gone");
        let (alive, mut rx_alive) = bind(&state, id, "here");
        drop(rx_dead);

        let delivered = broadcast(
            &state,
            id,
            Notification::PlayerJoined {
                player_id: "p9",
                name: "Nia",
            },
        );
        assert_eq!(delivered, 1);
        assert!(!state.subscribers().contains_key(&dead));
        assert!(state.subscribers().contains_key(&alive));
        let frame = next_frame(&mut rx_alive);
        assert_eq!(frame["type"], "player-joined");
        assert_eq!(frame["payload"]["name"], "Nia");
    }

    #[test]
    fn rebinding_the_same_player_is_silent() {
        let state = state();
        let id = Uuid::new_v4();
        let (conn_id, _old_rx) = bind(&state, id, "p1");
        let (_, mut watcher) = bind(&state, id, "p2");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let replaced = subscribe(
            &state,
            conn_id,
            Subscriber {
                session_id: id,
                player_id: "p1".into(),
                tx,
            },
        );
        assert!(replaced.is_some());
        assert!(watcher.try_recv().is_err());
        assert!(rx.try_recv().is_err());
        assert_eq!(state.subscribers().len(), 2);
    }

    #[test]
    fn rebinding_announces_departure_from_previous_session() {
        let state = state();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let (_, mut watcher) = bind(&state, first, "watcher");

        let (tx, _rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();
        let subscriber = |session_id| Subscriber {
            session_id,
            player_id: "mover".into(),
            tx: tx.clone(),
        };
        assert!(subscribe(&state, conn_id, subscriber(first)).is_none());
        let replaced = subscribe(&state, conn_id, subscriber(second)).unwrap();
        assert_eq!(replaced.session_id, first);

        let frame = next_frame(&mut watcher);
        assert_eq!(frame["type"], "player-left");
        assert_eq!(frame["payload"]["playerId"], "mover");
        assert_eq!(state.subscribers().get(&conn_id).unwrap().session_id, second);
    }

    #[test]
    fn unsubscribe_notifies_remaining_players() {
        let state = state();
        let id = Uuid::new_v4();
        let (leaving, _rx) = bind(&state, id, "leaving");
        let (_, mut staying) = bind(&state, id, "staying");

        let removed = unsubscribe(&state, leaving).unwrap();
        assert_eq!(removed.player_id, "leaving");
        assert_eq!(next_frame(&mut staying)["payload"]["playerId"], "leaving");
        assert!(unsubscribe(&state, leaving).is_none());
    }
}
