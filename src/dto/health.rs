use serde::Serialize;
use utoipa::ToSchema;

/// Payload of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct HealthResponse {
    /// `ok` while the club store is reachable, `degraded` otherwise.
    pub status: String,
    /// Live panels currently registered.
    pub open_panels: usize,
    /// Players held in the roster cache.
    pub roster_size: usize,
}

impl HealthResponse {
    pub fn new(degraded: bool, open_panels: usize, roster_size: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_owned(),
            open_panels,
            roster_size,
        }
    }
}
