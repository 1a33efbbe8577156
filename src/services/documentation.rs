use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Courtside Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::panel::open_panel,
        crate::routes::panel::get_panel,
        crate::routes::panel::close_panel,
        crate::routes::panel::panel_stream,
        crate::routes::panel::add_basket,
        crate::routes::panel::undo_basket,
        crate::routes::panel::list_unassigned,
        crate::routes::panel::assign_basket,
        crate::routes::event::game_statistics,
        crate::routes::event::leaderboard,
        crate::routes::event::advance_status,
        crate::routes::roster::list_roster,
        crate::routes::roster::refresh_roster,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::panel::OpenPanelRequest,
            crate::dto::panel::PanelOpenedResponse,
            crate::dto::panel::SideSummary,
            crate::dto::panel::SideView,
            crate::dto::panel::LogEntry,
            crate::dto::panel::PanelView,
            crate::dto::panel::AddBasketRequest,
            crate::dto::panel::UndoBasketRequest,
            crate::dto::panel::AssignBasketRequest,
            crate::dto::panel::AssignmentResponse,
            crate::dto::panel::UnassignedCounts,
            crate::dto::event::AdvanceStatusRequest,
            crate::dto::event::EventStatusResponse,
            crate::dto::event::PlayerStatSummary,
            crate::dto::event::GameBoxScore,
            crate::dto::event::LeaderboardEntry,
            crate::dto::roster::RosterPlayer,
            crate::dto::roster::RosterRefreshResponse,
            crate::dto::sse::PanelAlertEvent,
            crate::dto::sse::PanelClosedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "panels", description = "Live game panel: scoring, attribution and realtime stream"),
        (name = "events", description = "Event lifecycle and statistics"),
        (name = "roster", description = "Club players"),
    )
)]
pub struct ApiDoc;
