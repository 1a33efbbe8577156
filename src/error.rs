use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::dao::{
    models::{InvalidSideId, SideId},
    storage::StorageError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The caller's role does not allow the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The game document cannot be mapped onto two sides.
    #[error("malformed game state: {0}")]
    MalformedGameState(String),
    /// A score or basket write was rejected by the store.
    #[error("score update failed: {source}")]
    ScoreUpdateFailed {
        #[source]
        source: StorageError,
    },
    /// The player is not part of the roster bound to the side.
    #[error("player `{player_id}` is not on the roster of side `{side}`")]
    PlayerNotOnRoster { player_id: Uuid, side: SideId },
    /// Every basket of the requested tier is already attributed.
    #[error("no unassigned {points}-point basket left for side `{side}`")]
    NoUnassignedBasketAvailable { side: SideId, points: u8 },
}

impl ServiceError {
    /// Wrap a store failure raised while writing scores or baskets.
    pub fn score_update(source: StorageError) -> Self {
        ServiceError::ScoreUpdateFailed { source }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<InvalidSideId> for ServiceError {
    fn from(err: InvalidSideId) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Role does not allow the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Stored data cannot serve the request.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            err @ ServiceError::MalformedGameState(_) => AppError::Unprocessable(err.to_string()),
            err @ ServiceError::ScoreUpdateFailed { .. } => {
                AppError::ServiceUnavailable(err.to_string())
            }
            err @ ServiceError::PlayerNotOnRoster { .. } => {
                AppError::Unprocessable(err.to_string())
            }
            err @ ServiceError::NoUnassignedBasketAvailable { .. } => {
                AppError::Conflict(err.to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_statuses() {
        let status = |err: ServiceError| AppError::from(err).into_response().status();

        assert_eq!(
            status(ServiceError::MalformedGameState("no adversary".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(ServiceError::PlayerNotOnRoster {
                player_id: Uuid::new_v4(),
                side: SideId::Home,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(ServiceError::NoUnassignedBasketAvailable {
                side: SideId::Home,
                points: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ServiceError::Forbidden("admin only".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
    }
}
