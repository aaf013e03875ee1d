//! Forwards live events from the bus to viewer connections.

use std::sync::Arc;

use axum::extract::ws::Message;
use edgewind_events::{Audience, LiveEvent};
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Routes each [`LiveEvent`] to its audience: status updates to every
/// viewer, monitor updates to the device's subscribers only.
pub struct LiveFanout {
    ws_manager: Arc<WsManager>,
}

impl LiveFanout {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the fan-out loop.
    ///
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](edgewind_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<LiveEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.deliver(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Live fan-out lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, live fan-out shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver a single event.
    pub async fn deliver(&self, event: &LiveEvent) {
        let message = Message::Text(event.to_json().into());
        match event.audience() {
            Audience::Everyone => self.ws_manager.broadcast(message).await,
            Audience::Subscribers(device_id) => {
                let sent = self.ws_manager.send_to_subscribers(device_id, message).await;
                tracing::trace!(device_id, sent, "Monitor update delivered");
            }
        }
    }
}
