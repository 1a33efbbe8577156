use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::sse_events::{self, EVENT_PANEL_CLOSED},
    state::SharedState,
};

/// Subscribe to a panel's stream. The latest render, if any, is replayed first so late
/// subscribers do not wait for the next delivery.
pub fn subscribe_panel(
    state: &SharedState,
    panel_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, Option<ServerEvent>), ServiceError> {
    let panel = state.panel(panel_id)?;
    let receiver = panel.output().hub().subscribe();
    let initial = panel
        .output()
        .latest_view()
        .and_then(|view| sse_events::render_event(&view));
    Ok((receiver, initial))
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a broadcast receiver into an SSE response, forwarding events until the client
/// disconnects or the panel closes.
pub fn to_sse_stream(
    panel_id: Uuid,
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Option<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(payload) = initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let closing = payload.event.as_deref() == Some(EVENT_PANEL_CLOSED);
                            if tx.send(Ok(to_event(payload))).await.is_err() || closing {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Renders are full snapshots; the next one catches up.
                            continue;
                        }
                    }
                }
            }
        }

        info!(%panel_id, "panel SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
