use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Event lifecycle and statistics.
pub mod event;
/// Health check.
pub mod health;
/// Live panel endpoints.
pub mod panel;
/// Roster endpoints.
pub mod roster;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(panel::router())
        .merge(event::router())
        .merge(roster::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
