use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::session::SessionView;

#[derive(Debug, Deserialize, Serialize, ToSchema, PartialEq)]
/// Messages accepted from game WebSocket clients.
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Bind the connection to a session, replacing any previous binding.
    #[serde(rename_all = "camelCase")]
    JoinGame { game_id: Uuid, player_id: String },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Frames pushed to subscribers of a session.
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    GameStateUpdate(SessionView),
    PlayerJoined(PlayerPresence),
    PlayerLeft(PlayerPresence),
    GameStarted(SessionView),
    /// Sent to a single connection whose request could not be honoured.
    Error(ErrorPayload),
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPresence {
    pub game_id: Uuid,
    pub player_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn join_game_uses_camel_case_fields() {
        let id = Uuid::new_v4();
        let raw = json!({ "type": "join-game", "gameId": id, "playerId": "p1" }).to_string();
        assert_eq!(
            ClientMessage::from_json_str(&raw).unwrap(),
            ClientMessage::JoinGame {
                game_id: id,
                player_id: "p1".into()
            }
        );
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let message = ClientMessage::from_json_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(message, ClientMessage::Unknown);
    }

    #[test]
    fn outbound_frames_are_tagged_with_payload() {
        let frame = ServerMessage::PlayerLeft(PlayerPresence {
            game_id: Uuid::nil(),
            player_id: "p1".into(),
            name: None,
        });
        let value = serde_json::to_value(frame).unwrap();
        assert_eq!(value["type"], json!("player-left"));
        assert_eq!(value["payload"]["playerId"], json!("p1"));
        assert!(value["payload"].get("name").is_none());
    }
}
