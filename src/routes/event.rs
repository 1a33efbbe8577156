use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::event::{AdvanceStatusRequest, EventStatusResponse, GameBoxScore, LeaderboardEntry},
    error::AppError,
    routes::panel::role_from_headers,
    services::event_service,
    state::SharedState,
};

/// Event lifecycle and statistics endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route(
            "/events/{id}/games/{game_id}/statistics",
            get(game_statistics),
        )
        .route("/events/{id}/leaderboard", get(leaderboard))
        .route("/events/{id}/status", post(advance_status))
}

/// Box score of one game.
#[utoipa::path(
    get,
    path = "/events/{id}/games/{game_id}/statistics",
    tag = "events",
    params(
        ("id" = String, Path, description = "Identifier of the event"),
        ("game_id" = String, Path, description = "Identifier of the game")
    ),
    responses(
        (status = 200, description = "Scores and player statistics", body = GameBoxScore),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn game_statistics(
    State(state): State<SharedState>,
    Path((id, game_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<GameBoxScore>, AppError> {
    Ok(Json(
        event_service::game_statistics(&state, id, game_id).await?,
    ))
}

/// Points per player across every game of an event.
#[utoipa::path(
    get,
    path = "/events/{id}/leaderboard",
    tag = "events",
    params(("id" = String, Path, description = "Identifier of the event")),
    responses(
        (status = 200, description = "Leaderboard, best scorer first", body = [LeaderboardEntry]),
        (status = 404, description = "Unknown event")
    )
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    Ok(Json(event_service::leaderboard(&state, id).await?))
}

/// Move an event forward in its lifecycle.
#[utoipa::path(
    post,
    path = "/events/{id}/status",
    tag = "events",
    params(
        ("X-Club-Role" = Option<String>, Header, description = "Role claim of the requester"),
        ("id" = String, Path, description = "Identifier of the event")
    ),
    request_body = AdvanceStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = EventStatusResponse),
        (status = 403, description = "Requester is not an admin"),
        (status = 409, description = "Transition would move backwards")
    )
)]
pub async fn advance_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<AdvanceStatusRequest>,
) -> Result<Json<EventStatusResponse>, AppError> {
    let role = role_from_headers(&headers);
    Ok(Json(
        event_service::advance_status(&state, role, id, payload.status).await?,
    ))
}
