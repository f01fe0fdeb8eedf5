//! Session aggregate persistence over the KV store.
//!
//! A session is spread across several keys (body, scores, names, turn order and
//! current turn). Every write touching more than one of them goes through a
//! single `transaction`, and every read fetches all of them in one round trip,
//! so readers never observe a half-applied action.

use std::time::Duration;

use indexmap::IndexMap;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{
        kv::{Kv, KvCommand, KvReply},
        models::SessionEntity,
        storage::{StorageError, StorageResult},
    },
    state::{
        session::{Player, Roster, Session},
        turns::TurnScheduler,
    },
};

const GAME_PREFIX: &str = "game:";

/// Key holding the session body.
pub fn body_key(id: Uuid) -> String {
    format!("{GAME_PREFIX}{id}")
}

/// Hash of player id to score.
pub fn players_key(id: Uuid) -> String {
    format!("{GAME_PREFIX}{id}:players")
}

/// Hash of player id to display name.
pub fn names_key(id: Uuid) -> String {
    format!("{GAME_PREFIX}{id}:names")
}

/// List holding the fixed turn order.
pub fn turn_order_key(id: Uuid) -> String {
    format!("{GAME_PREFIX}{id}:turn_order")
}

/// String holding the id of the player whose turn it is.
pub fn current_turn_key(id: Uuid) -> String {
    format!("{GAME_PREFIX}{id}:current_turn")
}

/// Reads and writes whole session aggregates.
#[derive(Clone)]
pub struct SessionRepository {
    kv: Kv,
    ttl: Duration,
}

impl SessionRepository {
    pub fn new(kv: Kv, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Load the aggregate, or `None` when the body is absent or expired.
    pub async fn load(&self, id: Uuid) -> StorageResult<Option<Session>> {
        let body_key = body_key(id);
        let replies = self
            .kv
            .transaction(vec![
                KvCommand::Get {
                    key: body_key.clone(),
                },
                KvCommand::HGetAll {
                    key: players_key(id),
                },
                KvCommand::HGetAll { key: names_key(id) },
                KvCommand::LRange {
                    key: turn_order_key(id),
                    start: 0,
                    stop: -1,
                },
                KvCommand::Get {
                    key: current_turn_key(id),
                },
            ])
            .await?;

        let [body, scores, names, order, current]: [KvReply; 5] = replies
            .try_into()
            .map_err(|_| StorageError::UnexpectedReply { command: "MULTI" })?;

        let Some(body) = body.into_text("GET")? else {
            return Ok(None);
        };
        let entity: SessionEntity =
            serde_json::from_str(&body).map_err(|source| StorageError::Corrupted {
                key: body_key,
                source,
            })?;

        let roster = build_roster(
            id,
            scores.into_pairs("HGETALL")?,
            names.into_pairs("HGETALL")?,
        );
        let turns = TurnScheduler::restore(
            order.into_strings("LRANGE")?,
            current.into_text("GET")?,
        );

        Ok(Some(entity.into_session(roster, turns)))
    }

    /// Persist a freshly created session with its creator as the only player.
    pub async fn create(&self, session: &Session) -> StorageResult<()> {
        let mut commands = vec![self.write_body(session)?];
        for (player_id, player) in session.roster.iter() {
            commands.extend(self.write_player(session.id, player_id, player));
        }
        commands.extend(self.refresh_expiry(session.id));
        self.kv.transaction(commands).await?;
        Ok(())
    }

    /// Persist the body together with a newly joined player.
    pub async fn add_player(&self, session: &Session, player_id: &str) -> StorageResult<()> {
        let mut commands = vec![self.write_body(session)?];
        if let Some(player) = session.roster.get(player_id) {
            commands.extend(self.write_player(session.id, player_id, player));
        }
        commands.extend(self.refresh_expiry(session.id));
        self.kv.transaction(commands).await?;
        Ok(())
    }

    /// Persist the body together with the freshly established turn order.
    pub async fn start(&self, session: &Session) -> StorageResult<()> {
        let id = session.id;
        let mut commands = vec![
            self.write_body(session)?,
            KvCommand::Del {
                keys: vec![turn_order_key(id)],
            },
            KvCommand::RPush {
                key: turn_order_key(id),
                values: session.turns.order().to_vec(),
            },
        ];
        commands.extend(self.write_current_turn(session));
        commands.extend(self.refresh_expiry(id));
        self.kv.transaction(commands).await?;
        Ok(())
    }

    /// Persist the closed tile, the optional score increment and the advanced turn.
    pub async fn record_answer(
        &self,
        session: &Session,
        player_id: &str,
        awarded: Option<u32>,
    ) -> StorageResult<()> {
        let mut commands = vec![self.write_body(session)?];
        if let Some(points) = awarded {
            commands.push(KvCommand::HIncrBy {
                key: players_key(session.id),
                field: player_id.to_string(),
                delta: i64::from(points),
            });
        }
        commands.extend(self.write_current_turn(session));
        commands.extend(self.refresh_expiry(session.id));
        self.kv.transaction(commands).await?;
        Ok(())
    }

    /// Remove every key of the session. Absent keys are ignored.
    pub async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.kv
            .del(vec![
                body_key(id),
                players_key(id),
                names_key(id),
                turn_order_key(id),
                current_turn_key(id),
            ])
            .await?;
        Ok(())
    }

    fn write_body(&self, session: &Session) -> StorageResult<KvCommand> {
        let key = body_key(session.id);
        let value = serde_json::to_string(&SessionEntity::from(session))
            .map_err(|source| StorageError::Corrupted {
                key: key.clone(),
                source,
            })?;
        Ok(KvCommand::Set {
            key,
            value,
            ttl: Some(self.ttl),
        })
    }

    fn write_player(&self, id: Uuid, player_id: &str, player: &Player) -> [KvCommand; 2] {
        [
            KvCommand::HSet {
                key: players_key(id),
                field: player_id.to_string(),
                value: player.score.to_string(),
            },
            KvCommand::HSet {
                key: names_key(id),
                field: player_id.to_string(),
                value: player.name.clone(),
            },
        ]
    }

    /// Re-arm the ttl of the collection keys so they expire together with the body.
    fn refresh_expiry(&self, id: Uuid) -> [KvCommand; 3] {
        [players_key(id), names_key(id), turn_order_key(id)].map(|key| KvCommand::Expire {
            key,
            ttl: self.ttl,
        })
    }

    fn write_current_turn(&self, session: &Session) -> Option<KvCommand> {
        session.turns.current().map(|current| KvCommand::Set {
            key: current_turn_key(session.id),
            value: current.to_string(),
            ttl: Some(self.ttl),
        })
    }
}

/// Join scores and names into a roster, in the order scores are reported.
fn build_roster(
    id: Uuid,
    scores: IndexMap<String, String>,
    mut names: IndexMap<String, String>,
) -> Roster {
    let players = scores
        .into_iter()
        .map(|(player_id, raw_score)| {
            let score = raw_score.parse::<i64>().unwrap_or_else(|err| {
                warn!(session_id = %id, player_id = %player_id, error = %err, "unreadable score; treating as zero");
                0
            });
            let name = names
                .swap_remove(&player_id)
                .unwrap_or_else(|| player_id.clone());
            (player_id, Player { name, score })
        })
        .collect();
    Roster::from_players(players)
}
