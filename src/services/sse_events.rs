use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        panel::PanelView,
        sse::{PanelAlertEvent, PanelClosedEvent, ServerEvent},
    },
    error::ServiceError,
    state::panel::{LivePanel, PanelOutput},
};

/// Full render of a panel.
pub const EVENT_PANEL_RENDER: &str = "panel.render";
/// Failure message for panel clients.
pub const EVENT_PANEL_ALERT: &str = "panel.alert";
/// Last event of a panel stream.
pub const EVENT_PANEL_CLOSED: &str = "panel.closed";

/// Build the `panel.render` event for a view.
pub fn render_event(view: &PanelView) -> Option<ServerEvent> {
    match ServerEvent::json(Some(EVENT_PANEL_RENDER.to_string()), view) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(panel_id = %view.panel_id, error = %err, "failed to serialize panel render");
            None
        }
    }
}

/// Push a full render to the panel stream and retain it as the latest view.
pub fn broadcast_render(output: &PanelOutput, view: PanelView) {
    if let Some(event) = render_event(&view) {
        output.hub().broadcast(event);
    }
    output.store_view(Some(view));
}

/// Tell panel subscribers that something went wrong.
pub fn broadcast_alert(output: &PanelOutput, panel_id: Uuid, message: &str) {
    let payload = PanelAlertEvent {
        panel_id,
        message: message.to_owned(),
    };
    send_panel_event(output, EVENT_PANEL_ALERT, &payload);
}

/// Final event of a panel stream.
pub fn broadcast_closed(output: &PanelOutput, panel_id: Uuid) {
    send_panel_event(output, EVENT_PANEL_CLOSED, &PanelClosedEvent { panel_id });
}

/// Log a failed panel command and surface it as an alert when the store was at fault.
///
/// Authorisation and input errors only go back to the caller.
pub fn alert_on_failure<T>(
    panel: &LivePanel,
    action: &'static str,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    if let Err(err) = &result {
        warn!(panel_id = %panel.id(), action, error = %err, "panel command failed");
        if matches!(
            err,
            ServiceError::ScoreUpdateFailed { .. }
                | ServiceError::Unavailable(_)
                | ServiceError::Degraded
        ) {
            broadcast_alert(panel.output(), panel.id(), &err.to_string());
        }
    }
    result
}

fn send_panel_event(output: &PanelOutput, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => output.hub().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize panel SSE payload"),
    }
}
