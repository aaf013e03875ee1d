//! Route definitions for the operator dashboard endpoints.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::{devices, snapshots, work_orders};
use crate::state::AppState;

/// Operator routes mounted at `/api`.
///
/// ```text
/// GET   /work_orders              -> list_work_orders
/// PATCH /work_orders/{id}         -> update_work_order
/// GET   /faults                   -> list_faults
/// POST  /faults/{id}/dispatch     -> dispatch_fault
/// POST  /faults/{id}/resolve      -> resolve_fault
/// GET   /snapshots                -> list_snapshots
/// GET   /fault_snapshots          -> list_snapshot_events
/// GET   /fault_snapshots/event/{device_id}/{fault_code}/{timestamp}
///                                 -> get_snapshot_event
/// DELETE (same path)              -> delete_snapshot_event
/// GET   /devices                  -> list_devices
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/work_orders", get(work_orders::list_work_orders))
        .route("/work_orders/{id}", patch(work_orders::update_work_order))
        .route("/faults", get(work_orders::list_faults))
        .route("/faults/{id}/dispatch", post(work_orders::dispatch_fault))
        .route("/faults/{id}/resolve", post(work_orders::resolve_fault))
        .route("/snapshots", get(snapshots::list_snapshots))
        .route("/fault_snapshots", get(snapshots::list_snapshot_events))
        .route(
            "/fault_snapshots/event/{device_id}/{fault_code}/{timestamp}",
            get(snapshots::get_snapshot_event).delete(snapshots::delete_snapshot_event),
        )
        .route("/devices", get(devices::list_devices))
}
