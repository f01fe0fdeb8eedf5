use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{state_machine::SessionState, turns::TurnScheduler};

/// Difficulty tiers, ordered from the first board bucket to the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Difficulty {
    #[serde(rename = "Very Easy")]
    VeryEasy,
    #[serde(rename = "Easy")]
    Easy,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Hard")]
    Hard,
    #[serde(rename = "Very Hard")]
    VeryHard,
}

impl Difficulty {
    /// All tiers in bucket order.
    pub const TIERS: [Difficulty; 5] = [
        Difficulty::VeryEasy,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];

    /// Tier for a bucket index; indexes past the last tier saturate.
    pub fn from_bucket(index: usize) -> Self {
        Self::TIERS[index.min(Self::TIERS.len() - 1)]
    }

    /// Zero-based position of the tier.
    pub fn bucket(self) -> usize {
        Self::TIERS
            .iter()
            .position(|tier| *tier == self)
            .unwrap_or_default()
    }

    /// Points awarded for a correct answer on a tile of this tier.
    pub fn points(self) -> u32 {
        5 * (self.bucket() as u32 + 1)
    }
}

/// One question of the board: a track whose title must be guessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Stable identifier derived from the source track.
    pub id: String,
    /// Secret answer.
    pub title: String,
    pub artist: String,
    pub preview_url: String,
    pub difficulty: Difficulty,
    pub points: u32,
    /// Player who closed the tile, set once and never cleared.
    pub answered_by: Option<String>,
}

impl Tile {
    pub fn is_answered(&self) -> bool {
        self.answered_by.is_some()
    }
}

/// Roster entry of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub score: i64,
}

/// Players of a session keyed by player id, in join order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    players: IndexMap<String, Player>,
}

impl Roster {
    pub fn from_players(players: IndexMap<String, Player>) -> Self {
        Self { players }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn get(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    /// Insert a player with a zero score. Existing entries are left untouched.
    ///
    /// Returns `true` when the player was newly added.
    pub fn add(&mut self, player_id: &str, name: &str) -> bool {
        if self.players.contains_key(player_id) {
            return false;
        }
        self.players.insert(
            player_id.to_string(),
            Player {
                name: name.to_string(),
                score: 0,
            },
        );
        true
    }

    /// Add `points` to a player's score. Unknown players are ignored.
    pub fn award(&mut self, player_id: &str, points: u32) {
        if let Some(player) = self.players.get_mut(player_id) {
            player.score += i64::from(points);
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.players.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Player)> {
        self.players.iter()
    }
}

/// Filters used to acquire the tracks of a new board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameParams {
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub decades: Vec<String>,
    pub moods: Vec<String>,
    pub limit: u32,
}

impl GameParams {
    /// Lowercase and trim every filter value, dropping blanks.
    pub fn normalized(mut self) -> Self {
        for values in [
            &mut self.artists,
            &mut self.genres,
            &mut self.decades,
            &mut self.moods,
        ] {
            *values = values
                .iter()
                .map(|value| value.trim().to_lowercase())
                .filter(|value| !value.is_empty())
                .collect();
        }
        self
    }

    pub fn has_filters(&self) -> bool {
        !(self.artists.is_empty()
            && self.genres.is_empty()
            && self.decades.is_empty()
            && self.moods.is_empty())
    }
}

/// Aggregate root for one game: board, lifecycle, roster and turn state.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub state: SessionState,
    pub creator_id: String,
    /// Display order; fixed once the session is created.
    pub tiles: Vec<Tile>,
    /// Incremented on every persisted mutation.
    pub version: u64,
    pub created_at: SystemTime,
    pub roster: Roster,
    pub turns: TurnScheduler,
}

impl Session {
    /// Build an unstarted session owned by `creator_id`, who joins with a zero score.
    pub fn new(creator_id: &str, creator_name: &str, tiles: Vec<Tile>) -> Self {
        let mut roster = Roster::default();
        roster.add(creator_id, creator_name);
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Unstarted,
            creator_id: creator_id.to_string(),
            tiles,
            version: 0,
            created_at: SystemTime::now(),
            roster,
            turns: TurnScheduler::default(),
        }
    }

    pub fn tile(&self, tile_id: &str) -> Option<&Tile> {
        self.tiles.iter().find(|tile| tile.id == tile_id)
    }

    pub fn tile_index(&self, tile_id: &str) -> Option<usize> {
        self.tiles.iter().position(|tile| tile.id == tile_id)
    }

    pub fn all_answered(&self) -> bool {
        self.tiles.iter().all(Tile::is_answered)
    }
}
