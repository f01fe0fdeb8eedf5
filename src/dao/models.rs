use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, skip_serializing_none};
use uuid::Uuid;

use crate::state::{
    session::{Difficulty, Roster, Session, Tile},
    state_machine::SessionState,
    turns::TurnScheduler,
};

/// Session body stored under `game:{id}`.
///
/// Roster, scores and turn order live in their own keys and are not part of the body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntity {
    pub game_id: Uuid,
    pub state: SessionState,
    pub creator_id: String,
    pub tiles: Vec<TileEntity>,
    /// Incremented on every write of the aggregate.
    #[serde(default)]
    pub version: u64,
    #[serde(with = "serde_with::As::<TimestampMilliSeconds<i64>>")]
    pub created_at: SystemTime,
}

/// Tile entry inside a persisted session body.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TileEntity {
    pub tile_id: String,
    pub title: String,
    pub artist: String,
    pub preview_url: String,
    pub difficulty: Difficulty,
    pub points: u32,
    #[serde(default)]
    pub answered_by: Option<String>,
}

impl From<&Tile> for TileEntity {
    fn from(tile: &Tile) -> Self {
        Self {
            tile_id: tile.id.clone(),
            title: tile.title.clone(),
            artist: tile.artist.clone(),
            preview_url: tile.preview_url.clone(),
            difficulty: tile.difficulty,
            points: tile.points,
            answered_by: tile.answered_by.clone(),
        }
    }
}

impl From<TileEntity> for Tile {
    fn from(entity: TileEntity) -> Self {
        Self {
            id: entity.tile_id,
            title: entity.title,
            artist: entity.artist,
            preview_url: entity.preview_url,
            difficulty: entity.difficulty,
            points: entity.points,
            answered_by: entity.answered_by,
        }
    }
}

impl From<&Session> for SessionEntity {
    fn from(session: &Session) -> Self {
        Self {
            game_id: session.id,
            state: session.state,
            creator_id: session.creator_id.clone(),
            tiles: session.tiles.iter().map(TileEntity::from).collect(),
            version: session.version,
            created_at: session.created_at,
        }
    }
}

impl SessionEntity {
    /// Reassemble the aggregate from its body and the separately stored parts.
    pub fn into_session(self, roster: Roster, turns: TurnScheduler) -> Session {
        Session {
            id: self.game_id,
            state: self.state,
            creator_id: self.creator_id,
            tiles: self.tiles.into_iter().map(Tile::from).collect(),
            version: self.version,
            created_at: self.created_at,
            roster,
            turns,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn body_uses_camel_case_keys() {
        let session = Session::new(
            "creator",
            "Cleo",
            vec![Tile {
                id: "t1".into(),
                title: "Thriller".into(),
                artist: "Michael Jackson".into(),
                preview_url: "https://www.youtube.com/embed/abc".into(),
                difficulty: Difficulty::Hard,
                points: 20,
                answered_by: None,
            }],
        );

        let value = serde_json::to_value(SessionEntity::from(&session)).unwrap();
        assert_eq!(value["gameId"], json!(session.id.to_string()));
        assert_eq!(value["state"], json!("unstarted"));
        assert_eq!(value["creatorId"], json!("creator"));
        assert_eq!(value["tiles"][0]["tileId"], json!("t1"));
        assert_eq!(value["tiles"][0]["difficulty"], json!("Hard"));
        assert!(value["tiles"][0].get("answeredBy").is_none());
        assert!(value["createdAt"].is_i64());
    }

    #[test]
    fn legacy_body_without_version_decodes() {
        let raw = json!({
            "gameId": Uuid::nil(),
            "state": "in-progress",
            "creatorId": "c",
            "tiles": [],
            "createdAt": 1_700_000_000_000i64,
        });
        let entity: SessionEntity = serde_json::from_value(raw).unwrap();
        assert_eq!(entity.version, 0);
        assert_eq!(entity.state, SessionState::InProgress);
    }
}
