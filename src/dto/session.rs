use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::{
    session::{Difficulty, GameParams, Tile},
    state_machine::SessionState,
};

/// Filters used to generate a new board.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    #[serde(default)]
    #[validate(length(max = 20))]
    pub artists: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub genres: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub decades: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub moods: Vec<String>,
    /// Requested number of songs; values above the server cap are clamped.
    #[validate(range(min = 1))]
    pub limit: u32,
}

impl From<CreateGameRequest> for GameParams {
    fn from(request: CreateGameRequest) -> Self {
        Self {
            artists: request.artists,
            genres: request.genres,
            decades: request.decades,
            moods: request.moods,
            limit: request.limit,
        }
    }
}

/// Free-text description of the game to generate.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PromptGameRequest {
    #[validate(length(min = 1, max = 500))]
    pub prompt: String,
}

/// Body of the actions that only target a session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GameIdRequest {
    pub game_id: Uuid,
}

/// Query string of the session read endpoint.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GameQuery {
    pub game_id: Uuid,
}

/// Guess submitted for a tile.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub game_id: Uuid,
    #[validate(length(min = 1, max = 128))]
    pub tile_id: String,
    #[validate(length(max = 200))]
    pub answer: String,
}

/// Client-safe projection of a session, stamped with the viewing player.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub player_id: String,
    pub game_id: Uuid,
    pub state: SessionState,
    pub creator_id: String,
    pub tiles: Vec<TileView>,
    /// Roster in join order.
    pub players: Vec<PlayerView>,
    pub scores: BTreeMap<String, i64>,
    pub current_turn: Option<String>,
    pub turn_order: Vec<String>,
    /// Increases with every persisted change; clients drop views older than the last one seen.
    pub version: u64,
    pub created_at: String,
}

/// Tile as shown to clients. Title and artist are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TileView {
    pub tile_id: String,
    pub difficulty: Difficulty,
    pub points: u32,
    pub preview_url: String,
    pub answered_by: Option<String>,
}

impl From<&Tile> for TileView {
    fn from(tile: &Tile) -> Self {
        Self {
            tile_id: tile.id.clone(),
            difficulty: tile.difficulty,
            points: tile.points,
            preview_url: tile.preview_url.clone(),
            answered_by: tile.answered_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: String,
    pub name: String,
    pub score: i64,
}

/// Outcome of an answer submission.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub board: SessionView,
    pub is_correct: bool,
}

/// Success envelope shared by every HTTP action.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// Acknowledgement of a deleted session.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndedGame {
    pub game_id: Uuid,
}
