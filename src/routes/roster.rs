use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};

use crate::{
    dto::roster::{RosterPlayer, RosterRefreshResponse},
    error::AppError,
    routes::panel::role_from_headers,
    services::roster_service,
    state::SharedState,
};

/// Roster endpoints backed by the in-memory cache.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/roster", get(list_roster))
        .route("/roster/refresh", post(refresh_roster))
}

/// Players currently held in the roster cache.
#[utoipa::path(
    get,
    path = "/roster",
    tag = "roster",
    responses((status = 200, description = "Cached roster", body = [RosterPlayer]))
)]
pub async fn list_roster(State(state): State<SharedState>) -> Json<Vec<RosterPlayer>> {
    Json(roster_service::list(&state))
}

/// Reload the roster cache from storage.
#[utoipa::path(
    post,
    path = "/roster/refresh",
    tag = "roster",
    params(("X-Club-Role" = Option<String>, Header, description = "Role claim of the requester")),
    responses(
        (status = 200, description = "Roster reloaded", body = RosterRefreshResponse),
        (status = 403, description = "Requester is not an admin"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn refresh_roster(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<RosterRefreshResponse>, AppError> {
    let role = role_from_headers(&headers);
    Ok(Json(roster_service::refresh(&state, role).await?))
}
