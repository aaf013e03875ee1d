//! Opening incidents on fault onset.

use std::collections::HashMap;
use std::sync::Arc;

use edgewind_core::fault::FaultCode;
use edgewind_core::knowledge::fault_type_matches;
use edgewind_core::types::Timestamp;
use edgewind_db::models::work_order::{CreateWorkOrder, WorkOrder};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::JobContext;
use crate::store::StoreResult;

#[derive(Debug, Clone)]
pub struct IncidentRequest {
    pub device_id: String,
    pub fault_code: FaultCode,
    pub location: Option<String>,
    pub detected_at: Timestamp,
}

/// Per-device locks held across the dedup lookup and the insert, so
/// workers racing on two onsets of one device open a single incident.
#[derive(Default)]
pub struct IncidentLocks {
    devices: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IncidentLocks {
    pub async fn acquire(&self, device_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut devices = self.devices.lock().await;
            // Entries nobody holds are recreated on demand.
            devices.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(devices.entry(device_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Create an incident for a fault onset unless one for the same fault was
/// opened within the dedup window. Returns the new incident, if any.
pub async fn open_incident(
    ctx: &JobContext,
    req: &IncidentRequest,
) -> StoreResult<Option<WorkOrder>> {
    let Some(info) = ctx.knowledge.lookup(req.fault_code) else {
        tracing::warn!(
            device_id = %req.device_id,
            fault_code = %req.fault_code,
            "No knowledge entry for fault, incident not opened"
        );
        return Ok(None);
    };

    ctx.store
        .ensure_device(&req.device_id, req.location.as_deref())
        .await?;

    let _guard = ctx.incident_locks.acquire(&req.device_id).await;
    let window = chrono::Duration::from_std(ctx.incident_dedup_window).unwrap_or_default();
    let recent = ctx
        .store
        .latest_incident_since(&req.device_id, req.detected_at - window)
        .await?;
    if recent.is_some_and(|o| fault_type_matches(o.fault_type.as_deref(), &info.name)) {
        tracing::debug!(
            device_id = %req.device_id,
            fault_code = %req.fault_code,
            "Duplicate onset inside dedup window, incident skipped"
        );
        return Ok(None);
    }

    let order = ctx
        .store
        .create_incident(&CreateWorkOrder {
            device_id: req.device_id.clone(),
            fault_time: req.detected_at,
            location: req.location.clone(),
            fault_type: info.name.clone(),
            ai_recommendation: ctx.knowledge.recommendation(req.fault_code, req.detected_at),
        })
        .await?;

    tracing::info!(
        device_id = %order.device_id,
        work_order_id = order.id,
        fault_type = %info.name,
        "Incident opened"
    );
    Ok(Some(order))
}
