use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent on the panel stream when a command or a subscription fails.
pub struct PanelAlertEvent {
    pub panel_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Last event of a panel stream.
pub struct PanelClosedEvent {
    pub panel_id: Uuid,
}
