//! Server-Sent Events helpers for the daemon's `/events` endpoint.

use crate::events::{DaemonEvent, EventBus};
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Subscribe to `bus` and render every [`DaemonEvent`] as a named SSE event
/// with a JSON payload, interleaved with a 15s heartbeat comment so idle
/// connections are detected as dropped promptly.
pub fn create_event_sse_stream(
    bus: EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("new SSE client connected to daemon event stream");

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        let mut rx = bus.subscribe();
        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if let Some(rendered) = render(&event) {
                                yield Ok(rendered);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "SSE client lagged behind event bus; resuming");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

fn render(event: &DaemonEvent) -> Option<Event> {
    let payload = serde_json::to_string(event).ok()?;
    Some(Event::default().event(event.event_type()).data(payload))
}
