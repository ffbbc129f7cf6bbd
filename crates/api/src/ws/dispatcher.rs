use std::sync::Arc;

use axum::extract::ws::Message;
use futures::SinkExt;
use intervue_services::fanout::RoomEvent;
use intervue_services::rooms::RoomService;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::storage::WsStorage;

/// Sends a JSON message to a specific connection by connection_id.
pub async fn send_to_connection(
    ws_storage: &WsStorage,
    connection_id: &str,
    message: &serde_json::Value,
) {
    if let Some(sender) = ws_storage.get(connection_id) {
        let text = serde_json::to_string(message).unwrap_or_default();
        let mut guard = sender.lock().await;
        if let Err(e) = guard.send(Message::text(text)).await {
            warn!(%connection_id, %e, "Failed to send WS message to connection");
        }
    }
}

/// Sends a JSON message to every listed connection.
pub async fn broadcast_to_connections(
    ws_storage: &WsStorage,
    connection_ids: &[String],
    message: &serde_json::Value,
) {
    for connection_id in connection_ids {
        send_to_connection(ws_storage, connection_id, message).await;
    }
}

/// Drains the cluster bus's local delivery channel: every room event —
/// published on this instance or received from the broker — lands here and
/// is fanned out to the round's local members.
pub async fn delivery_loop(
    mut events: mpsc::UnboundedReceiver<RoomEvent>,
    rooms: Arc<RoomService>,
    ws_storage: Arc<WsStorage>,
) {
    while let Some(event) = events.recv().await {
        let members = rooms.local_members(event.round_id);
        if members.is_empty() {
            continue;
        }
        debug!(round_id = %event.round_id, count = members.len(), "delivering room event");
        broadcast_to_connections(&ws_storage, &members, &event.event).await;
    }
    debug!("room event delivery loop ended");
}
