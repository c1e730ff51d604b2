//! Server-sent event stream
//!
//! Forwards every [`PlateEvent`] on the bus to connected clients so a UI can
//! follow refresh progress without polling `/refresh/status`.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}

/// GET /events - stream of plate and refresh events
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_bus.subscribe();
    info!(
        subscribers = state.event_bus.subscriber_count(),
        "SSE client connected"
    );

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: forwarding {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => warn!("SSE: failed to serialize {}: {}", event_type, e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE client fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("SSE: event bus closed, ending stream");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
