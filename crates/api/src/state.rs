use std::sync::Arc;

use edgewind_core::channel::ChannelNormalizer;
use edgewind_core::hub::DeviceHub;
use edgewind_core::knowledge::FaultKnowledge;

use crate::config::ServerConfig;
use crate::jobs::JobQueue;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (operator endpoints and health).
    pub pool: edgewind_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Viewer connection manager.
    pub ws_manager: Arc<WsManager>,
    /// Live event bus feeding the viewer fan-out.
    pub event_bus: Arc<edgewind_events::EventBus>,
    /// Per-device in-memory ingestion state.
    pub hub: Arc<DeviceHub>,
    /// Background durable writes.
    pub jobs: JobQueue,
    pub knowledge: Arc<dyn FaultKnowledge>,
    /// Channel normalizer built from the ingestion config.
    pub normalizer: Arc<ChannelNormalizer>,
}
