/// Statistic attribution: unassigned basket counts, assignment and stat recompute.
pub mod attribution_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Event lifecycle, box scores and leaderboards.
pub mod event_service;
/// Health check service.
pub mod health_service;
/// Live panel sessions: open, close and the realtime render loop.
pub mod panel_service;
/// Roster cache loading and listing.
pub mod roster_service;
/// Scoring engine: add and undo baskets.
pub mod scoring_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;

#[cfg(test)]
mod test_support;
