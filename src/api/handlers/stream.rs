//! Server-Sent Events stream of change notifications.
//!
//! Each message is an unnamed SSE event whose data is the JSON
//! `{"type": ..., "payload": ...}`, so browser `onmessage` handlers see all
//! of them. A `hello` message is sent first.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};

use crate::api::auth::AuthUser;
use crate::api::state::AppState;
use crate::events::ChangeEvent;

const KEEP_ALIVE_SECS: u64 = 15;

fn to_sse(event: &ChangeEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            tracing::warn!(kind = event.kind(), "Failed to serialize change event: {}", e);
            None
        }
    }
}

/// GET /stream
pub async fn event_stream(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(user_id = user.user_id, "Stream client connected");

    // Subscribe before sending hello so nothing published in between is lost.
    let updates = state
        .notifier
        .subscribe()
        .into_stream()
        .filter_map(|result| async move {
            match result {
                Ok(event) => to_sse(&event).map(Ok),
                Err(e) => {
                    tracing::warn!("Stream listener lagged: {:?}", e);
                    None
                }
            }
        });

    let hello = stream::iter(to_sse(&ChangeEvent::Hello {}).map(Ok));

    Sse::new(hello.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}
