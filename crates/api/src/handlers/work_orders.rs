//! Handlers for incident (work order) management.

use axum::extract::{Path, State};
use axum::Json;
use edgewind_core::error::CoreError;
use edgewind_core::fault::FaultCode;
use edgewind_core::incident::{IncidentStatus, Severity};
use edgewind_core::knowledge::infer_fault_code;
use edgewind_core::mailbox::DeviceCommand;
use edgewind_core::types::{DbId, Timestamp};
use edgewind_db::models::work_order::{WorkOrder, WorkOrderWithDevice};
use edgewind_db::repositories::WorkOrderRepo;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// GET /api/work_orders
pub async fn list_work_orders(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<WorkOrder>>>> {
    let orders = WorkOrderRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: orders }))
}

/// One entry of the fault feed.
#[derive(Debug, Serialize)]
pub struct FaultView {
    pub id: DbId,
    pub device_id: String,
    pub location: Option<String>,
    pub fault_type: Option<String>,
    pub fault_code: FaultCode,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub ai_recommendation: Option<String>,
    pub fault_time: Timestamp,
}

/// GET /api/faults
pub async fn list_faults(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<FaultView>>>> {
    let rows = WorkOrderRepo::list_with_device(&state.pool).await?;
    Ok(Json(DataResponse {
        data: rows.into_iter().map(fault_view).collect(),
    }))
}

/// PATCH /api/work_orders/{id}
pub async fn update_work_order(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateStatusRequest>,
) -> AppResult<Json<DataResponse<WorkOrder>>> {
    let status: IncidentStatus = input.status.parse()?;
    let order = apply_status(&state, id, status).await?;
    Ok(Json(DataResponse { data: order }))
}

/// POST /api/faults/{id}/dispatch
pub async fn dispatch_fault(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkOrder>>> {
    let order = apply_status(&state, id, IncidentStatus::Processing).await?;
    Ok(Json(DataResponse { data: order }))
}

/// POST /api/faults/{id}/resolve
pub async fn resolve_fault(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WorkOrder>>> {
    let order = apply_status(&state, id, IncidentStatus::Resolved).await?;
    Ok(Json(DataResponse { data: order }))
}

/// Persist a status change. Closing an incident queues a `reset` for the
/// device, delivered with its next heartbeat responses.
async fn apply_status(state: &AppState, id: DbId, status: IncidentStatus) -> AppResult<WorkOrder> {
    let order = WorkOrderRepo::update_status(&state.pool, id, status)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Work order",
            id: id.to_string(),
        })?;

    if status.closes_incident() {
        state
            .hub
            .set_command(&order.device_id, DeviceCommand::Reset)
            .await;
        tracing::info!(
            work_order_id = id,
            device_id = %order.device_id,
            status = %status,
            "Incident closed, reset queued"
        );
    } else {
        tracing::info!(work_order_id = id, status = %status, "Incident status updated");
    }

    Ok(order)
}

/// The device's current fault wins while it is still faulty; otherwise the
/// code is recovered from the incident's fault type.
fn fault_view(row: WorkOrderWithDevice) -> FaultView {
    let WorkOrderWithDevice {
        order,
        device_location,
        device_fault_code,
    } = row;

    let fault_code = device_fault_code
        .as_deref()
        .map(FaultCode::from_wire)
        .filter(|code| !code.is_normal())
        .unwrap_or_else(|| infer_fault_code(order.fault_type.as_deref()));
    let status = order
        .status
        .parse::<IncidentStatus>()
        .unwrap_or_default()
        .feed_status();

    FaultView {
        id: order.id,
        severity: Severity::assess(fault_code, order.fault_type.as_deref()),
        device_id: order.device_id,
        location: order.location.or(device_location),
        fault_type: order.fault_type,
        fault_code,
        status,
        ai_recommendation: order.ai_recommendation,
        fault_time: order.fault_time,
    }
}
