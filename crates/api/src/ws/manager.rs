use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use edgewind_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};

/// Outbound messages buffered per viewer. A viewer that falls this far
/// behind loses new messages until its socket catches up.
pub const VIEWER_QUEUE_CAPACITY: usize = 256;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::Sender<Message>;

/// Metadata for a single viewer connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
    /// Devices whose monitor stream this viewer receives.
    pub subscriptions: HashSet<String>,
}

/// Manages all active viewer connections and their device subscriptions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(VIEWER_QUEUE_CAPACITY);
        let conn = WsConnection {
            sender: tx,
            connected_at: chrono::Utc::now(),
            subscriptions: HashSet::new(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID, dropping its subscriptions.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Join the monitor group of `device_id`. Returns `false` for an
    /// unknown connection.
    pub async fn subscribe(&self, conn_id: &str, device_id: &str) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.subscriptions.insert(device_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Leave the monitor group of `device_id`. Leaving a group the
    /// connection never joined is a no-op.
    pub async fn unsubscribe(&self, conn_id: &str, device_id: &str) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.subscriptions.remove(device_id);
        }
    }

    /// Number of connections subscribed to `device_id`.
    pub async fn subscriber_count(&self, device_id: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| conn.subscriptions.contains(device_id))
            .count()
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed or full are skipped.
    /// Closed ones are cleaned up on their next receive loop iteration.
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for (conn_id, conn) in conns.iter() {
            enqueue(conn_id, conn, message.clone());
        }
    }

    /// Send a message to every connection subscribed to `device_id`.
    ///
    /// Returns the number of connections the message was queued for.
    pub async fn send_to_subscribers(&self, device_id: &str, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for (conn_id, conn) in conns.iter() {
            if conn.subscriptions.contains(device_id) && enqueue(conn_id, conn, message.clone()) {
                count += 1;
            }
        }
        count
    }

    /// Send a message to one connection. Returns `false` if it is gone or
    /// its queue is full.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        match self.connections.read().await.get(conn_id) {
            Some(conn) => enqueue(conn_id, conn, message),
            None => false,
        }
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.try_send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for (conn_id, conn) in conns.iter() {
            enqueue(conn_id, conn, Message::Ping(Bytes::new()));
        }
    }
}

/// Queue `message` without waiting. A stalled viewer drops it.
fn enqueue(conn_id: &str, conn: &WsConnection, message: Message) -> bool {
    match conn.sender.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::debug!(conn_id, "Viewer queue full, dropping message");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
