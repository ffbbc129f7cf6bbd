use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use intervue_db::models::{InsightCategory, InsightSeverity};
use intervue_services::auth::{Identity, Role};
use intervue_services::dao::NewInsight;
use intervue_services::ingest::{IngestError, MediaFragment, MediaKind};
use intervue_services::rooms::RoomError;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// Session gate: the credential is checked before the upgrade completes;
/// a bad or expired token means the socket never opens.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match state.auth.verify(&params.token) {
        Ok(identity) => identity,
        Err(e) => {
            debug!(%e, "WebSocket handshake refused");
            return Response::builder()
                .status(401)
                .body("Unauthorized".into())
                .unwrap();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let connection_id = Uuid::new_v4().to_string();
    info!(user_id = %identity.id, %connection_id, role = ?identity.role, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    state.ws_storage.add(connection_id.clone(), sender.clone());

    super::dispatcher::send_to_connection(
        &state.ws_storage,
        &connection_id,
        &json!({
            "type": "connected",
            "data": {
                "userId": identity.id,
                "role": identity.role,
            }
        }),
    )
    .await;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, &identity, &connection_id, &text).await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(user_id = %identity.id, %connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Disconnect implies leave; no graceful drain.
    state.ws_storage.remove(&connection_id);
    state.rooms.leave(&connection_id).await;

    info!(user_id = %identity.id, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    text: &str,
) {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return,
    };

    let msg_type = parsed.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let data = parsed.get("data");

    debug!(user_id = %identity.id, %connection_id, msg_type, "WS message received");

    match msg_type {
        "ping" => {
            super::dispatcher::send_to_connection(
                &state.ws_storage,
                connection_id,
                &json!({ "type": "pong" }),
            )
            .await;
        }
        "join-room" => {
            handle_join_room(state, identity, connection_id, data).await;
        }
        "leave-room" => {
            state.rooms.leave(connection_id).await;
        }
        "media-fragment" => {
            handle_media_fragment(state, identity, connection_id, data).await;
        }
        "client-visibility-change" => {
            handle_visibility_change(state, identity, data).await;
        }
        _ => {
            debug!(user_id = %identity.id, msg_type, "Unknown WS message type");
        }
    }
}

async fn send_authorization_error(state: &AppState, connection_id: &str, message: &str) {
    super::dispatcher::send_to_connection(
        &state.ws_storage,
        connection_id,
        &json!({
            "type": "authorization-error",
            "data": { "message": message }
        }),
    )
    .await;
}

async fn handle_join_room(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    data: Option<&serde_json::Value>,
) {
    let round_id_str = match data.and_then(|d| d.get("roundId")).and_then(|r| r.as_str()) {
        Some(s) => s,
        None => {
            send_authorization_error(state, connection_id, "Missing roundId").await;
            return;
        }
    };

    // An unparseable id can never name an existing round: same deny path.
    let round_id = match Uuid::parse_str(round_id_str) {
        Ok(id) => id,
        Err(_) => {
            send_authorization_error(state, connection_id, "Not authorized for this round").await;
            return;
        }
    };

    match state.rooms.join(connection_id, identity, round_id).await {
        Ok(_grant) => {
            super::dispatcher::send_to_connection(
                &state.ws_storage,
                connection_id,
                &json!({
                    "type": "joined-room",
                    "data": { "roundId": round_id }
                }),
            )
            .await;

            send_catch_up(state, connection_id, round_id).await;
        }
        Err(RoomError::AccessDenied) => {
            send_authorization_error(state, connection_id, "Not authorized for this round").await;
        }
    }
}

/// Replays recently persisted insights to the joining connection only;
/// existing members are not re-broadcast.
async fn send_catch_up(state: &AppState, connection_id: &str, round_id: Uuid) {
    let window = Duration::from_secs(state.settings.insights.catch_up_window_secs);
    match state.store.recent_insights(round_id, window).await {
        Ok(insights) => {
            super::dispatcher::send_to_connection(
                &state.ws_storage,
                connection_id,
                &json!({
                    "type": "catch-up-batch",
                    "data": { "insights": insights }
                }),
            )
            .await;
        }
        Err(e) => {
            // Tolerated: the member still gets the live stream.
            warn!(%round_id, %connection_id, %e, "catch-up fetch failed");
        }
    }
}

async fn handle_media_fragment(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    data: Option<&serde_json::Value>,
) {
    let data = match data {
        Some(d) => d,
        None => return,
    };

    let round_id = match data
        .get("roundId")
        .and_then(|r| r.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        Some(id) => id,
        None => {
            debug!(%connection_id, "media fragment without valid roundId dropped");
            return;
        }
    };
    let kind = match data
        .get("kind")
        .and_then(|k| k.as_str())
        .and_then(MediaKind::parse)
    {
        Some(kind) => kind,
        None => {
            debug!(%connection_id, "media fragment without valid kind dropped");
            return;
        }
    };
    let payload = match data.get("payload").and_then(|p| p.as_str()) {
        Some(p) => p.to_string(),
        None => {
            debug!(%connection_id, "media fragment without payload dropped");
            return;
        }
    };
    let timestamp_ms = data
        .get("timestamp")
        .and_then(|t| t.as_i64())
        .unwrap_or_default();

    let fragment = MediaFragment {
        round_id,
        kind,
        payload,
        timestamp_ms,
    };

    // Fire-and-forget: the submitter never sees ingestion failures.
    match state.ingest.ingest(identity, &fragment).await {
        Ok(()) => {}
        Err(IngestError::RoleDenied(role)) => {
            warn!(user_id = %identity.id, ?role, %round_id, "media fragment from non-candidate dropped");
        }
        Err(e) => {
            warn!(%round_id, %e, "media ingestion failed");
        }
    }
}

/// Visibility loss on the candidate's tab is itself a fraud signal; it is
/// synthesized here and pushed through the same pipeline as worker results.
async fn handle_visibility_change(
    state: &AppState,
    identity: &Identity,
    data: Option<&serde_json::Value>,
) {
    let data = match data {
        Some(d) => d,
        None => return,
    };

    let round_id = match data
        .get("roundId")
        .and_then(|r| r.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        Some(id) => id,
        None => return,
    };
    let visible = data.get("visible").and_then(|v| v.as_bool()).unwrap_or(true);
    let timestamp_ms = data
        .get("timestamp")
        .and_then(|t| t.as_i64())
        .unwrap_or_default();

    if visible {
        return;
    }
    if state.settings.ingest.candidate_only && identity.role != Role::Candidate {
        debug!(user_id = %identity.id, %round_id, "visibility change from non-candidate ignored");
        return;
    }

    info!(user_id = %identity.id, %round_id, "tab switch detected");
    state
        .engine
        .process(NewInsight {
            round_id,
            insight_type: "TAB_SWITCH".to_string(),
            category: InsightCategory::Fraud,
            severity: InsightSeverity::High,
            timestamp_ms,
            value: json!({ "confidence": 0.9, "visible": false }),
            explanation: Some("Candidate switched away from the interview tab".to_string()),
            model_version: None,
        })
        .await;
}
