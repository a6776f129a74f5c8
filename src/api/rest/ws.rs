use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::models::identity::Identity;
use crate::state::AppState;
use crate::store::Collection;
use crate::sync::projector;

#[derive(Deserialize)]
pub struct WsParams {
    pub actor: Uuid,
}

/// Pushes the viewer's full visible delivery set on every store change,
/// starting with the current snapshot: the store subscription contract,
/// carried over the wire unchanged.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let viewer: Identity = state
        .store
        .get_as(Collection::Users, params.actor)
        .map_err(|_| AppError::WriteDenied("unknown actor".to_string()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, viewer)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, viewer: Identity) {
    let (mut sender, mut receiver) = socket.split();

    let filter_viewer = viewer.clone();
    let sub = state.store.subscribe(Collection::Deliveries, move |doc| {
        serde_json::from_value::<Delivery>(doc.clone())
            .map(|delivery| projector::can_view(&filter_viewer, &delivery))
            .unwrap_or(false)
    });
    let (guard, rx) = sub.into_parts();

    info!(viewer_id = %viewer.id, "delivery feed client connected");

    let mut send_task = tokio::spawn(async move {
        // Holding the guard keeps the store listener registered exactly as
        // long as this task runs.
        let _guard = guard;
        let mut stream = WatchStream::new(rx);

        while let Some(set) = stream.next().await {
            let json = match serde_json::to_string(&set) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize delivery set for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    // Whichever side ends first, the other is torn down with it so the store
    // listener is released immediately, not on the next failed send.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(viewer_id = %viewer.id, "delivery feed client disconnected");
}
