//! Route definitions for the device-facing endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{ingest, nodes};
use crate::state::AppState;

/// Device routes mounted at `/api`.
///
/// Write endpoints require the device API key (enforced by the
/// `DeviceKey` extractor).
///
/// ```text
/// POST /node/heartbeat      -> node_heartbeat
/// POST /upload              -> legacy_upload
/// POST /register            -> register_device
/// GET  /get_active_nodes    -> get_active_nodes
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/node/heartbeat", post(ingest::node_heartbeat))
        .route("/upload", post(ingest::legacy_upload))
        .route("/register", post(ingest::register_device))
        .route("/get_active_nodes", get(nodes::get_active_nodes))
}
