pub mod devices;
pub mod health;
pub mod operator;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /node/heartbeat                  device heartbeat (device key)
/// /upload                          legacy single-waveform upload (device key)
/// /register                        device registration (device key)
/// /get_active_nodes                live registry snapshot
///
/// /work_orders                     list incidents
/// /work_orders/{id}                update incident status (PATCH)
/// /faults/{id}/dispatch            mark processing (POST)
/// /faults/{id}/resolve             mark resolved, queue reset (POST)
/// /snapshots                       fault snapshots (GET)
/// /devices                         devices with live status (GET)
/// ```
///
/// `/ws` and `/health` are mounted at the root by the app router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Device-facing ingestion.
        .merge(devices::router())
        // Operator dashboard.
        .merge(operator::router())
}
