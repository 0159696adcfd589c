use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use server_api::list_opportunities;
use shared::protocol::{ListQuery, ServerEvent, Snapshot};
use tokio::sync::broadcast::error::RecvError;

use crate::app_state::AppState;

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, query))
}

async fn snapshot_event(state: &AppState, query: &ListQuery) -> ServerEvent {
    match list_opportunities(&state.api, query).await {
        Ok(records) => ServerEvent::Snapshot(Snapshot { records }),
        Err(error) => ServerEvent::Error(error),
    }
}

/// Pushes a full snapshot on connect and again after every change notice.
/// A lagged subscriber has missed notices, so it gets a fresh snapshot too.
async fn ws_connection(state: Arc<AppState>, socket: WebSocket, query: ListQuery) {
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        let mut event = snapshot_event(&state, &query).await;
        loop {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(error) => tracing::warn!(%error, "failed to encode snapshot event"),
            }

            event = match events_rx.recv().await {
                Ok(event @ ServerEvent::SubmissionsChanged { .. }) => event,
                Ok(_) => snapshot_event(&state, &query).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "snapshot subscriber lagged, resending snapshot");
                    snapshot_event(&state, &query).await
                }
                Err(RecvError::Closed) => break,
            };
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}
