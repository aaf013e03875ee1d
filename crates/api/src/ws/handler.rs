use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use edgewind_core::fault::FaultCode;
use edgewind_core::liveness::DeviceStatus;
use edgewind_core::types::Timestamp;
use edgewind_events::LiveEvent;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::AppState;

/// Inbound viewer message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    SubscribeNode { node_id: Option<Value> },
    UnsubscribeNode { node_id: Option<Value> },
}

/// One entry of the `node_status_list` sent on connect.
#[derive(Debug, Serialize)]
struct NodeSummary<'a> {
    node_id: &'a str,
    status: DeviceStatus,
    fault_code: FaultCode,
    timestamp: Timestamp,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by a spawned sender task plus the receive loop below.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single viewer connection after upgrade.
///
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Sends the current node list.
///   4. Processes subscribe/unsubscribe requests until disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Viewer connected");

    let ws_manager = state.ws_manager.clone();
    let mut rx = ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    ws_manager
        .send_to(&conn_id, text(node_status_list(&state).await))
        .await;

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(body)) => handle_client_message(&state, &conn_id, body.as_str()).await,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Viewer disconnected");
}

async fn handle_client_message(state: &AppState, conn_id: &str, body: &str) {
    let message = match serde_json::from_str::<ClientMessage>(body) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Ignoring unrecognized viewer message");
            return;
        }
    };

    match message {
        ClientMessage::SubscribeNode { node_id } => {
            let Some(device_id) = node_id.as_ref().and_then(id_from_json) else {
                send_missing_node_id(state, conn_id).await;
                return;
            };
            state.ws_manager.subscribe(conn_id, &device_id).await;
            tracing::debug!(conn_id, device_id = %device_id, "Viewer subscribed");

            if let Some(entry) = state.hub.latest(&device_id, Utc::now()).await {
                let initial = LiveEvent::initial_monitor(&entry);
                state.ws_manager.send_to(conn_id, text(initial.to_json())).await;
            }
        }
        ClientMessage::UnsubscribeNode { node_id } => {
            let Some(device_id) = node_id.as_ref().and_then(id_from_json) else {
                send_missing_node_id(state, conn_id).await;
                return;
            };
            state.ws_manager.unsubscribe(conn_id, &device_id).await;
            tracing::debug!(conn_id, device_id = %device_id, "Viewer unsubscribed");
        }
    }
}

async fn node_status_list(state: &AppState) -> String {
    let active = state.hub.active_nodes(Utc::now()).await;
    let nodes: Vec<NodeSummary<'_>> = active
        .nodes
        .iter()
        .map(|entry| NodeSummary {
            node_id: &entry.device_id,
            status: entry.status,
            fault_code: entry.fault_code,
            timestamp: entry.last_seen,
        })
        .collect();
    json!({ "type": "node_status_list", "nodes": nodes }).to_string()
}

async fn send_missing_node_id(state: &AppState, conn_id: &str) {
    let error = json!({ "type": "error", "message": "Missing node_id" }).to_string();
    state.ws_manager.send_to(conn_id, text(error)).await;
}

/// Device ids arrive as strings, but some clients send numbers.
fn id_from_json(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn text(body: String) -> Message {
    Message::Text(body.into())
}
