use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ErrorPayload, ServerMessage},
    error::ServiceError,
    services::{broadcast, session_service},
    state::{SharedState, Subscriber},
};

/// Failure while serving one inbound frame.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of a game WebSocket connection.
///
/// The connection stays silent until a `join-game` frame binds it to a
/// session; a later `join-game` replaces the binding.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps broadcasts flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    debug!(conn_id = %conn_id, "websocket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let outcome = match ClientMessage::from_json_str(&text) {
                    Ok(ClientMessage::JoinGame { game_id, player_id }) => {
                        handle_join(&state, conn_id, &outbound_tx, game_id, player_id).await
                    }
                    Ok(ClientMessage::Unknown) => {
                        debug!(conn_id = %conn_id, "ignoring unsupported message type");
                        Ok(())
                    }
                    Err(err) => {
                        warn!(conn_id = %conn_id, error = %err, "failed to parse client message");
                        Ok(())
                    }
                };

                match outcome {
                    Ok(()) => {}
                    Err(SocketError::ConnectionClosed) => {
                        info!(conn_id = %conn_id, "connection closed while replying, terminating");
                        break;
                    }
                    Err(SocketError::Service(err)) => {
                        warn!(conn_id = %conn_id, error = %err, "join-game rejected");
                        let frame = ServerMessage::Error(ErrorPayload {
                            code: err.code().to_string(),
                            message: err.to_string(),
                        });
                        if send_message_to_websocket(&outbound_tx, &frame).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(conn_id = %conn_id, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Some(subscriber) = broadcast::unsubscribe(&state, conn_id) {
        info!(
            session_id = %subscriber.session_id,
            player_id = %subscriber.player_id,
            "player left"
        );
    }

    finalize(writer_task, outbound_tx).await;
}

/// Bind the connection to `game_id` and send it the current view.
async fn handle_join(
    state: &SharedState,
    conn_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    game_id: Uuid,
    player_id: String,
) -> Result<(), SocketError> {
    let view = session_service::get_session(state, game_id, &player_id).await?;

    let replaced = broadcast::subscribe(
        state,
        conn_id,
        Subscriber {
            session_id: game_id,
            player_id: player_id.clone(),
            tx: outbound_tx.clone(),
        },
    );
    if let Some(previous) = replaced {
        debug!(conn_id = %conn_id, previous = %previous.session_id, "replaced subscription");
    }
    info!(session_id = %game_id, player_id = %player_id, "player subscribed");

    send_message_to_websocket(outbound_tx, &ServerMessage::GameStateUpdate(view))
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), SocketError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
