//! Server-Sent Events (SSE) utilities

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::IldEvent;

/// Stream [`IldEvent`]s from a broadcast channel as SSE
///
/// Sends a `ConnectionStatus` event first. When `user_id` is given, events
/// scoped to other users are filtered out. A lagging client skips the missed
/// events and keeps streaming.
pub fn create_event_sse_stream(
    service_name: &'static str,
    mut rx: broadcast::Receiver<IldEvent>,
    user_id: Option<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let (Some(wanted), Some(owner)) = (user_id, event.user_id()) {
                        if wanted != owner {
                            continue;
                        }
                    }

                    match serde_json::to_string(&event) {
                        Ok(data) => {
                            debug!("SSE: Sending {}", event.event_type());
                            yield Ok(Event::default().event(event.event_type()).data(data));
                        }
                        Err(e) => warn!("SSE: Failed to serialize event: {}", e),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE: {} client lagged, skipped {} events", service_name, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("SSE: {} event channel closed", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
