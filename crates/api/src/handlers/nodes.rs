//! Live node registry endpoint.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use edgewind_core::channel::{ChannelReading, SampleMetrics};
use edgewind_core::fault::FaultCode;
use edgewind_core::liveness::{DeviceStatus, LivenessEntry};
use edgewind_core::types::Timestamp;
use serde::Serialize;

use crate::state::AppState;

/// One live node as shown to operators: its latest heartbeat.
#[derive(Debug, Serialize)]
pub struct NodeView {
    pub node_id: String,
    pub status: DeviceStatus,
    pub fault_code: FaultCode,
    pub timestamp: Timestamp,
    pub location: Option<String>,
    pub hw_version: Option<String>,
    pub metrics: SampleMetrics,
    /// Channel values without waveforms.
    pub channels: Vec<ChannelReading>,
}

impl From<&LivenessEntry> for NodeView {
    fn from(entry: &LivenessEntry) -> Self {
        let payload = &entry.last_payload;
        Self {
            node_id: entry.device_id.clone(),
            status: entry.status,
            fault_code: entry.fault_code,
            timestamp: entry.last_seen,
            location: payload.location.clone(),
            hw_version: payload.hw_version.clone(),
            metrics: payload.normalized.metrics(),
            channels: payload.channels.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActiveNodesResponse {
    pub success: bool,
    pub nodes: Vec<NodeView>,
    pub count: usize,
    pub expired_count: usize,
}

/// GET /api/get_active_nodes
///
/// Evicts expired entries as a side effect and reports how many.
pub async fn get_active_nodes(State(state): State<AppState>) -> Json<ActiveNodesResponse> {
    let active = state.hub.active_nodes(Utc::now()).await;
    let nodes: Vec<NodeView> = active.nodes.iter().map(NodeView::from).collect();

    Json(ActiveNodesResponse {
        success: true,
        count: nodes.len(),
        nodes,
        expired_count: active.expired_count,
    })
}
