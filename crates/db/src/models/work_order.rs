//! Incidents ("work orders") opened on fault onset.

use edgewind_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkOrder {
    pub id: DbId,
    pub device_id: String,
    pub fault_time: Timestamp,
    pub location: Option<String>,
    /// Display name of the fault, as given by the knowledge table.
    pub fault_type: Option<String>,
    pub ai_recommendation: Option<String>,
    pub status: String,
}

/// An incident joined with the current row of its device.
#[derive(Debug, Clone, FromRow)]
pub struct WorkOrderWithDevice {
    #[sqlx(flatten)]
    pub order: WorkOrder,
    pub device_location: Option<String>,
    pub device_fault_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateWorkOrder {
    pub device_id: String,
    pub fault_time: Timestamp,
    pub location: Option<String>,
    pub fault_type: String,
    pub ai_recommendation: Option<String>,
}
