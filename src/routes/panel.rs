use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::SideId,
    dto::panel::{
        AddBasketRequest, AssignBasketRequest, AssignmentResponse, OpenPanelRequest,
        PanelOpenedResponse, PanelView, UnassignedCounts, UndoBasketRequest,
    },
    error::{AppError, ServiceError},
    services::{attribution_service, panel_service, scoring_service, sse_service},
    state::{SharedState, panel::Role},
};

/// Header carrying the requester's role claim, as resolved by the portal's auth layer.
pub const ROLE_HEADER: &str = "x-club-role";

/// Live panel endpoints: lifecycle, scoring, attribution and the realtime stream.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/panels", post(open_panel))
        .route("/panels/{id}", get(get_panel).delete(close_panel))
        .route("/panels/{id}/stream", get(panel_stream))
        .route("/panels/{id}/baskets", post(add_basket))
        .route("/panels/{id}/baskets/undo", post(undo_basket))
        .route("/panels/{id}/unassigned/{side}", get(list_unassigned))
        .route("/panels/{id}/assignments", post(assign_basket))
}

pub(crate) fn role_from_headers(headers: &HeaderMap) -> Role {
    Role::from_claim(
        headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok()),
    )
}

fn parse_side(raw: &str) -> Result<SideId, AppError> {
    Ok(raw.parse::<SideId>().map_err(ServiceError::from)?)
}

/// Open a live panel on one game and start following its baskets and scores.
#[utoipa::path(
    post,
    path = "/panels",
    tag = "panels",
    params(("X-Club-Role" = Option<String>, Header, description = "Role claim of the requester (`admin` or `player`)")),
    request_body = OpenPanelRequest,
    responses(
        (status = 200, description = "Panel opened", body = PanelOpenedResponse),
        (status = 404, description = "Unknown event or game"),
        (status = 422, description = "Game cannot be mapped onto two sides"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn open_panel(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<OpenPanelRequest>,
) -> Result<Json<PanelOpenedResponse>, AppError> {
    let role = role_from_headers(&headers);
    let opened =
        panel_service::open_panel(&state, role, payload.event_id, payload.game_id).await?;
    Ok(Json(opened))
}

/// Latest render of an open panel.
#[utoipa::path(
    get,
    path = "/panels/{id}",
    tag = "panels",
    params(("id" = String, Path, description = "Identifier of the panel")),
    responses(
        (status = 200, description = "Latest render", body = PanelView),
        (status = 404, description = "Unknown or closed panel"),
        (status = 409, description = "Nothing rendered yet")
    )
)]
pub async fn get_panel(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PanelView>, AppError> {
    Ok(Json(panel_service::latest_view(&state, id)?))
}

/// Close a panel, cancelling its subscriptions. Closing twice is harmless.
#[utoipa::path(
    delete,
    path = "/panels/{id}",
    tag = "panels",
    params(("id" = String, Path, description = "Identifier of the panel")),
    responses((status = 204, description = "Panel closed"))
)]
pub async fn close_panel(State(state): State<SharedState>, Path(id): Path<Uuid>) -> StatusCode {
    panel_service::close_panel(&state, id).await;
    StatusCode::NO_CONTENT
}

/// Stream `panel.render`, `panel.alert` and `panel.closed` events of a panel.
#[utoipa::path(
    get,
    path = "/panels/{id}/stream",
    tag = "panels",
    params(("id" = String, Path, description = "Identifier of the panel")),
    responses(
        (status = 200, description = "Panel SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown or closed panel")
    )
)]
pub async fn panel_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, initial) = sse_service::subscribe_panel(&state, id)?;
    info!(panel_id = %id, "new panel SSE connection");
    Ok(sse_service::to_sse_stream(id, receiver, initial))
}

/// Record a basket for one side of the game.
#[utoipa::path(
    post,
    path = "/panels/{id}/baskets",
    tag = "panels",
    params(("id" = String, Path, description = "Identifier of the panel")),
    request_body = AddBasketRequest,
    responses(
        (status = 204, description = "Basket recorded"),
        (status = 400, description = "Invalid side or point value"),
        (status = 403, description = "Panel opened without the admin role"),
        (status = 503, description = "Score update failed")
    )
)]
pub async fn add_basket(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddBasketRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    let side = parse_side(&payload.side)?;
    let panel = state.panel(id)?;
    scoring_service::add_basket(&state, &panel, side, payload.points).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Undo the most recent basket of one side.
#[utoipa::path(
    post,
    path = "/panels/{id}/baskets/undo",
    tag = "panels",
    params(("id" = String, Path, description = "Identifier of the panel")),
    request_body = UndoBasketRequest,
    responses(
        (status = 204, description = "Latest basket removed, or nothing to undo"),
        (status = 403, description = "Panel opened without the admin role"),
        (status = 503, description = "Score update failed")
    )
)]
pub async fn undo_basket(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UndoBasketRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    let side = parse_side(&payload.side)?;
    let panel = state.panel(id)?;
    scoring_service::undo_last_basket(&state, &panel, side).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Count the unassigned baskets of a side per point value.
#[utoipa::path(
    get,
    path = "/panels/{id}/unassigned/{side}",
    tag = "panels",
    params(
        ("id" = String, Path, description = "Identifier of the panel"),
        ("side" = String, Path, description = "`home`, `opponent` or a team identifier")
    ),
    responses(
        (status = 200, description = "Unassigned distribution", body = UnassignedCounts),
        (status = 403, description = "Panel opened without the admin role"),
        (status = 404, description = "Unknown or closed panel")
    )
)]
pub async fn list_unassigned(
    State(state): State<SharedState>,
    Path((id, side)): Path<(Uuid, String)>,
) -> Result<Json<UnassignedCounts>, AppError> {
    let side = parse_side(&side)?;
    let panel = state.panel(id)?;
    attribution_service::list_unassigned(&state, &panel, side)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("panel `{id}` is closed")))
}

/// Attribute one unassigned basket to a player and recompute their statistic.
#[utoipa::path(
    post,
    path = "/panels/{id}/assignments",
    tag = "panels",
    params(("id" = String, Path, description = "Identifier of the panel")),
    request_body = AssignBasketRequest,
    responses(
        (status = 200, description = "Basket attributed", body = AssignmentResponse),
        (status = 403, description = "Panel opened without the admin role"),
        (status = 409, description = "No unassigned basket left in that tier"),
        (status = 422, description = "Player not on the side's roster")
    )
)]
pub async fn assign_basket(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignBasketRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    payload.validate()?;
    let side = parse_side(&payload.side)?;
    let panel = state.panel(id)?;
    attribution_service::assign_basket(&state, &panel, payload.player_id, side, payload.points)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("panel `{id}` is closed")))
}
