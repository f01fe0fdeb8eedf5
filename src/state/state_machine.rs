use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// Board generated; players may join.
    Unstarted,
    /// Turn order fixed; answers are accepted.
    InProgress,
    /// No further actions are accepted.
    Ended,
}

/// Events that drive [`SessionState`] forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Creator starts the game.
    Start,
    /// Every tile has been answered.
    BoardCleared,
    /// Session is torn down.
    End,
}

/// Error returned when an event is not legal from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// State the session was in when the event was received.
    pub from: SessionState,
    /// The rejected event.
    pub event: SessionEvent,
}

impl SessionState {
    /// Compute the state reached by applying `event`.
    pub fn next(self, event: SessionEvent) -> Result<SessionState, InvalidTransition> {
        let next = match (self, event) {
            (SessionState::Unstarted, SessionEvent::Start) => SessionState::InProgress,
            (SessionState::InProgress, SessionEvent::BoardCleared) => SessionState::Ended,
            (SessionState::Unstarted | SessionState::InProgress, SessionEvent::End) => {
                SessionState::Ended
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// Apply `event` in place.
    pub fn advance(&mut self, event: SessionEvent) -> Result<(), InvalidTransition> {
        *self = self.next(event)?;
        Ok(())
    }
}
