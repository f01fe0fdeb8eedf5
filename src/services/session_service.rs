//! Session engine: lifecycle, turn enforcement, scoring and the client view.
//!
//! Every mutation of an existing session runs inside the session's gate (see
//! [`crate::state::gates::SessionGates`]), reads the aggregate, applies the
//! action and writes every touched key in one store transaction. Broadcasts go
//! out after the write, still inside the gate, so subscribers receive views in
//! version order.

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::session::SessionRepository,
    dto::{
        format_system_time,
        session::{PlayerView, SessionView, TileView},
    },
    error::ServiceError,
    providers::ParsedPrompt,
    services::broadcast::{self, Notification},
    state::{
        SharedState,
        session::{GameParams, Session},
        state_machine::{SessionEvent, SessionState},
        turns::TurnScheduler,
    },
};

/// Resolve `params` into a board and persist a new unstarted session.
///
/// Track acquisition happens before any session key exists, so no gate is held
/// while the external collaborators are called.
pub async fn create_session(
    state: &SharedState,
    params: GameParams,
    creator_id: &str,
    creator_name: &str,
) -> Result<Session, ServiceError> {
    let creator_id = required("player id", creator_id)?;
    let creator_name = required("player name", creator_name)?;
    let mut params = params.normalized();
    params.limit = state.config().clamp_song_count(params.limit);

    let repo = state.sessions().await?;
    let kv = state.require_kv().await?;
    let tiles = state.board().build(&kv, &params).await?;
    if tiles.is_empty() {
        return Err(ServiceError::Acquisition("no tracks resolved".into()));
    }

    let session = Session::new(creator_id, creator_name, tiles);
    repo.create(&session).await?;
    info!(
        session_id = %session.id,
        creator_id = %creator_id,
        tiles = session.tiles.len(),
        "session created"
    );
    Ok(session)
}

/// Extract parameters from free text, then follow [`create_session`].
///
/// A parser failure falls back to using the prompt itself as a mood filter.
pub async fn create_session_from_prompt(
    state: &SharedState,
    prompt: &str,
    creator_id: &str,
    creator_name: &str,
) -> Result<Session, ServiceError> {
    let prompt = required("prompt", prompt)?;
    let default_limit = state.config().default_song_count;

    let params = match state.prompt_parser().parse(prompt.to_string()).await {
        Ok(parsed) => params_from_prompt(parsed, default_limit),
        Err(err) => {
            warn!(
                parser = state.prompt_parser().name(),
                error = %err,
                "prompt parsing failed; searching with the raw prompt"
            );
            GameParams::default()
        }
    };
    let params = if params.has_filters() {
        params
    } else {
        GameParams {
            moods: vec![prompt.to_string()],
            limit: default_limit,
            ..GameParams::default()
        }
    };

    create_session(state, params, creator_id, creator_name).await
}

/// Add a player to an unstarted session.
///
/// Joining twice is a no-op that keeps the existing name and score.
pub async fn join_session(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
    player_name: &str,
) -> Result<Session, ServiceError> {
    let player_id = required("player id", player_id)?;
    let player_name = required("player name", player_name)?;
    let repo = state.sessions().await?;
    let max_players = state.config().max_players;

    state
        .gates()
        .run(session_id, || async move {
            let mut session = load_existing(&repo, session_id).await?;
            if session.state != SessionState::Unstarted {
                return Err(ServiceError::InvalidState(format!(
                    "session {session_id} has already started"
                )));
            }
            if session.roster.contains(player_id) {
                return Ok(session);
            }
            if session.roster.len() >= max_players {
                return Err(ServiceError::RosterFull(format!(
                    "session {session_id} already has {max_players} players"
                )));
            }

            session.roster.add(player_id, player_name);
            session.version += 1;
            repo.add_player(&session, player_id).await?;
            info!(session_id = %session_id, player_id = %player_id, "player joined");

            broadcast::broadcast(
                state,
                session_id,
                Notification::PlayerJoined {
                    player_id,
                    name: player_name,
                },
            );
            broadcast::broadcast(state, session_id, Notification::GameStateUpdate(&session));
            Ok(session)
        })
        .await
}

/// Shuffle the roster into the turn order and open the board. Creator only.
pub async fn start_session(
    state: &SharedState,
    session_id: Uuid,
    requester_id: &str,
) -> Result<Session, ServiceError> {
    let repo = state.sessions().await?;

    state
        .gates()
        .run(session_id, || async move {
            let mut session = load_existing(&repo, session_id).await?;
            if session.creator_id != requester_id {
                return Err(ServiceError::Unauthorized(
                    "only the creator can start the session".into(),
                ));
            }
            if session.roster.is_empty() {
                return Err(ServiceError::InvalidState(format!(
                    "session {session_id} has no players"
                )));
            }

            session.state.advance(SessionEvent::Start)?;
            let order = {
                let mut rng = rand::rng();
                TurnScheduler::shuffled(session.roster.ids().cloned(), &mut rng)
            };
            session.turns.set_turn_order(order);
            session.version += 1;
            repo.start(&session).await?;
            info!(
                session_id = %session_id,
                players = session.roster.len(),
                first = session.turns.current().unwrap_or_default(),
                "session started"
            );

            broadcast::broadcast(state, session_id, Notification::GameStarted(&session));
            Ok(session)
        })
        .await
}

/// Resolve `tile_id` with the guess of the current turn holder.
///
/// The tile closes and the turn advances whatever the outcome; points are only
/// awarded for a correct guess. Returns the session as re-read after the write,
/// or as applied in memory when that read fails.
pub async fn submit_answer(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
    tile_id: &str,
    answer: &str,
) -> Result<(Session, bool), ServiceError> {
    let repo = state.sessions().await?;
    let matcher = state.matcher();

    state
        .gates()
        .run(session_id, || async move {
            let mut session = load_existing(&repo, session_id).await?;
            if session.state != SessionState::InProgress {
                return Err(ServiceError::InvalidState(format!(
                    "session {session_id} is not in progress"
                )));
            }
            if !session.turns.is_turn_of(player_id) {
                return Err(ServiceError::OutOfTurn(format!(
                    "it is not {player_id}'s turn"
                )));
            }
            let index = session
                .tile_index(tile_id)
                .ok_or_else(|| ServiceError::NotFound(format!("tile {tile_id}")))?;
            let tile = &mut session.tiles[index];
            if tile.is_answered() {
                return Err(ServiceError::AlreadyAnswered(format!("tile {tile_id}")));
            }

            let is_correct = matcher.is_match(answer, &tile.title);
            tile.answered_by = Some(player_id.to_string());
            let awarded = is_correct.then_some(tile.points);
            if let Some(points) = awarded {
                session.roster.award(player_id, points);
            }
            session.turns.advance();
            if session.all_answered() {
                session.state.advance(SessionEvent::BoardCleared)?;
            }
            session.version += 1;
            repo.record_answer(&session, player_id, awarded).await?;
            info!(
                session_id = %session_id,
                player_id = %player_id,
                tile_id = %tile_id,
                is_correct,
                "answer recorded"
            );

            // The answer is committed; a failed re-read must not turn it into an error.
            let session = match repo.load(session_id).await {
                Ok(Some(refreshed)) => refreshed,
                Ok(None) => {
                    warn!(session_id = %session_id, "session expired right after an answer");
                    session
                }
                Err(err) => {
                    warn!(
                        session_id = %session_id,
                        error = %err,
                        "re-read after answer failed; using the applied state"
                    );
                    session
                }
            };
            broadcast::broadcast(state, session_id, Notification::GameStateUpdate(&session));
            Ok((session, is_correct))
        })
        .await
}

/// Delete every key of the session. Absent sessions are not an error.
///
/// Subscribers of a session that still existed receive a final ended view.
pub async fn end_session(state: &SharedState, session_id: Uuid) -> Result<(), ServiceError> {
    let repo = state.sessions().await?;

    state
        .gates()
        .run(session_id, || async move {
            let existing = repo.load(session_id).await.unwrap_or_else(|err| {
                warn!(session_id = %session_id, error = %err, "unreadable session; deleting anyway");
                None
            });
            repo.delete(session_id).await?;

            let Some(mut session) = existing else {
                return Ok(());
            };
            if let Ok(next) = session.state.next(SessionEvent::End) {
                session.state = next;
            }
            session.version += 1;
            info!(session_id = %session_id, "session ended");
            broadcast::broadcast(state, session_id, Notification::GameStateUpdate(&session));
            Ok(())
        })
        .await
}

/// Read-only view of a session for `player_id`.
pub async fn get_session(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
) -> Result<SessionView, ServiceError> {
    let repo = state.sessions().await?;
    let session = load_existing(&repo, session_id).await?;
    Ok(to_view(&session, player_id))
}

/// Project a session into the shape sent to clients. Tile titles and artists
/// never leave the server through any other path.
pub fn to_view(session: &Session, player_id: &str) -> SessionView {
    SessionView {
        player_id: player_id.to_string(),
        game_id: session.id,
        state: session.state,
        creator_id: session.creator_id.clone(),
        tiles: session.tiles.iter().map(TileView::from).collect(),
        players: session
            .roster
            .iter()
            .map(|(id, player)| PlayerView {
                player_id: id.clone(),
                name: player.name.clone(),
                score: player.score,
            })
            .collect(),
        scores: session
            .roster
            .iter()
            .map(|(id, player)| (id.clone(), player.score))
            .collect(),
        current_turn: session.turns.current().map(str::to_string),
        turn_order: session.turns.order().to_vec(),
        version: session.version,
        created_at: format_system_time(session.created_at),
    }
}

async fn load_existing(
    repo: &SessionRepository,
    session_id: Uuid,
) -> Result<Session, ServiceError> {
    repo.load(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session {session_id}")))
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(value)
}

/// Lowercasing and clamping happen later in [`create_session`].
fn params_from_prompt(parsed: ParsedPrompt, default_limit: u32) -> GameParams {
    let limit = parsed
        .limit
        .filter(|limit| limit.is_finite() && *limit >= 1.0)
        .map(|limit| limit.round().min(f64::from(u32::MAX)) as u32)
        .unwrap_or(default_limit);
    GameParams {
        artists: parsed.artists,
        genres: parsed.genres,
        decades: parsed.decades,
        moods: parsed.moods,
        limit,
    }
    .normalized()
}
