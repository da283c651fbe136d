use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;

use crate::routes::session::SessionView;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(overlay_events))
}

/// Streams an `overlay` event for every published overlay change.
pub async fn overlay_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut shutdown_rx = state.shutdown_rx();
    let mut overlay_rx = state.session().overlay().subscribe();
    let session_id = state.session().session_id();
    let viewport = state.viewport();

    let stream = async_stream::stream! {
        loop {
            let snapshot = overlay_rx.borrow_and_update().clone();
            let view = SessionView::new(session_id, snapshot, viewport);
            if let Ok(json) = serde_json::to_string(&view) {
                yield Ok(Event::default().event("overlay").data(json));
            }

            tokio::select! {
                changed = overlay_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
