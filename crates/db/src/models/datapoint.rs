//! Raw legacy-upload waveforms.

use edgewind_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DataPoint {
    pub id: DbId,
    pub device_id: String,
    pub recorded_at: Timestamp,
    pub waveform: serde_json::Value,
    pub status: Option<String>,
    pub fault_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateDataPoint {
    pub device_id: String,
    pub recorded_at: Timestamp,
    pub waveform: Vec<f64>,
    pub status: Option<String>,
    pub fault_code: Option<String>,
}
