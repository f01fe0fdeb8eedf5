//! Request extractors that report failures with the JSON error envelope.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use axum_valid::{Valid, ValidationRejection};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{AppError, ServiceError};

const PLAYER_ID_HEADER: &str = "player-id";
const PLAYER_NAME_HEADER: &str = "player-name";

/// JSON body validated with [`Validate`] before reaching the handler.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Valid::<Json<T>>::from_request(req, state).await {
            Ok(Valid(Json(value))) => Ok(Self(value)),
            Err(ValidationRejection::Valid(errors)) => Err(errors.into()),
            Err(ValidationRejection::Inner(rejection)) => {
                Err(AppError::BadRequest(rejection.body_text()))
            }
        }
    }
}

/// Query string validated with [`Validate`] before reaching the handler.
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Valid::<Query<T>>::from_request_parts(parts, state).await {
            Ok(Valid(Query(value))) => Ok(Self(value)),
            Err(ValidationRejection::Valid(errors)) => Err(errors.into()),
            Err(ValidationRejection::Inner(rejection)) => {
                Err(AppError::BadRequest(rejection.body_text()))
            }
        }
    }
}

/// Caller identity carried by the `player-id` and `player-name` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerHeaders {
    pub id: String,
    /// Display name; falls back to the id when the header is absent.
    pub name: String,
}

impl<S> FromRequestParts<S> for PlayerHeaders
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let id = header(PLAYER_ID_HEADER).ok_or_else(|| {
            ServiceError::Validation(format!("missing `{PLAYER_ID_HEADER}` header"))
        })?;
        let name = header(PLAYER_NAME_HEADER).unwrap_or_else(|| id.clone());
        Ok(Self { id, name })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn headers(request: Request<()>) -> Result<PlayerHeaders, AppError> {
        let (mut parts, _) = request.into_parts();
        PlayerHeaders::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_identity_headers() {
        let request = Request::builder()
            .header("player-id", " p1 ")
            .header("player-name", "Ada")
            .body(())
            .unwrap();
        let player = headers(request).await.unwrap();
        assert_eq!(player.id, "p1");
        assert_eq!(player.name, "Ada");
    }

    #[tokio::test]
    async fn name_defaults_to_id() {
        let request = Request::builder()
            .header("player-id", "p1")
            .body(())
            .unwrap();
        assert_eq!(headers(request).await.unwrap().name, "p1");
    }

    #[tokio::test]
    async fn missing_id_is_a_validation_error() {
        let request = Request::builder().body(()).unwrap();
        let err = headers(request).await.unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }
}
