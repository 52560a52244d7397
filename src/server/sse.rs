//! Per-connection SSE transport for workflow events.
//!
//! GET /api/workflows/{id}/events
//!
//! Each connection registers with the broadcast hub and then streams
//! whatever the hub delivers: the `connected` acknowledgment, presence
//! updates, lifecycle events and heartbeats. When the client goes away
//! axum drops the stream, which drops the subscription guard, which
//! removes the handle from the hub.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
};
use serde::Deserialize;
use tokio_stream::{StreamExt, wrappers::UnboundedReceiverStream};
use tracing::debug;

use super::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn workflow_events(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    // Presence identity comes from the query string or the identity
    // header; an anonymous connection still receives events but does
    // not appear in the connected-users list.
    let user_id = query.user_id.or_else(|| {
        headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    });

    debug!(%workflow_id, ?user_id, "event stream opened");
    let (subscription, rx) = state.hub.subscribe(&workflow_id, user_id);

    let stream = UnboundedReceiverStream::new(rx).map(move |event| {
        // The subscription guard rides along with the stream; dropping
        // the stream unsubscribes promptly.
        let _keep_alive = &subscription;
        Event::default().json_data(&event)
    });

    Sse::new(stream)
}
