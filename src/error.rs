use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::state_machine::InvalidTransition};

/// Errors that can occur in service layer operations.
///
/// Every variant maps to a stable machine-readable code, see [`ServiceError::code`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Session or tile does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Action is not legal for the current session state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Creator-only action attempted by another player.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Answer submitted by a player who does not hold the turn.
    #[error("not your turn: {0}")]
    OutOfTurn(String),
    /// Tile has already been closed by an earlier answer.
    #[error("tile already answered: {0}")]
    AlreadyAnswered(String),
    /// Roster reached its hard cap.
    #[error("roster full: {0}")]
    RosterFull(String),
    /// No track could be acquired for the board.
    #[error("track acquisition failed: {0}")]
    Acquisition(String),
    /// Malformed input parameters.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Storage backend failed while serving the request.
    #[error("storage unavailable")]
    StoreUnavailable(#[source] StorageError),
    /// Stored session data could not be interpreted.
    #[error("corrupted session data")]
    CorruptedData(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
}

impl ServiceError {
    /// Stable code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::OutOfTurn(_) => "out_of_turn",
            ServiceError::AlreadyAnswered(_) => "already_answered",
            ServiceError::RosterFull(_) => "roster_full",
            ServiceError::Acquisition(_) => "acquisition_error",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::StoreUnavailable(_) | ServiceError::Degraded => "store_unavailable",
            ServiceError::CorruptedData(_) => "corrupted_data",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupted { .. } | StorageError::WrongType { .. } => {
                error!(error = %err, "stored session data is unreadable");
                ServiceError::CorruptedData(err)
            }
            StorageError::Unavailable { .. } | StorageError::UnexpectedReply { .. } => {
                ServiceError::StoreUnavailable(err)
            }
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request could not be decoded or failed validation before reaching a service.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Error raised by the service layer.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::Service(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    code: &'static str,
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Service(err) => match err {
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Unauthorized(_) => StatusCode::FORBIDDEN,
                ServiceError::InvalidState(_)
                | ServiceError::OutOfTurn(_)
                | ServiceError::AlreadyAnswered(_)
                | ServiceError::RosterFull(_) => StatusCode::CONFLICT,
                ServiceError::Acquisition(_) => StatusCode::BAD_GATEWAY,
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::StoreUnavailable(_) | ServiceError::Degraded => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ServiceError::CorruptedData(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Stable code placed in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Service(err) => err.code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            success: false,
            code: self.code(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
