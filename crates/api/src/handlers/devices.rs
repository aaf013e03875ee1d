//! Device listing with live status.
//!
//! Stored device status lags behind the heartbeat stream (writes are
//! throttled), so the status returned here is recomputed from the live
//! registry: a device without a live entry is `offline`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use edgewind_core::fault::FaultCode;
use edgewind_core::liveness::{DeviceStatus, LivenessEntry};
use edgewind_core::types::Timestamp;
use edgewind_db::models::device::{Device, DeviceFilter};
use edgewind_db::repositories::DeviceRepo;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default look-back for "recently active" devices.
const DEFAULT_ACTIVE_MINUTES: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct DeviceListQuery {
    /// Only devices that are live right now.
    #[serde(default)]
    pub online_only: bool,
    /// Every registered device, regardless of last heartbeat.
    #[serde(default)]
    pub all: bool,
    /// Look-back for recently active devices (default 30).
    pub minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub device_id: String,
    pub location: String,
    pub hw_version: String,
    pub status: DeviceStatus,
    pub fault_code: FaultCode,
    pub last_heartbeat: Option<Timestamp>,
}

/// GET /api/devices?online_only=&all=&minutes=
pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<DeviceListQuery>,
) -> AppResult<Json<DataResponse<Vec<DeviceView>>>> {
    let now = Utc::now();
    let live: HashMap<String, LivenessEntry> = state
        .hub
        .active_nodes(now)
        .await
        .nodes
        .into_iter()
        .map(|entry| (entry.device_id.clone(), entry))
        .collect();

    let Some(filter) = device_filter(&query, &live, now) else {
        return Ok(Json(DataResponse { data: Vec::new() }));
    };

    let devices = DeviceRepo::list(&state.pool, &filter).await?;
    let views = devices
        .into_iter()
        .map(|device| device_view(device, &live))
        .collect();
    Ok(Json(DataResponse { data: views }))
}

/// Translate the query into a repository filter. `None` means the answer
/// is known to be empty without asking the database.
fn device_filter(
    query: &DeviceListQuery,
    live: &HashMap<String, LivenessEntry>,
    now: Timestamp,
) -> Option<DeviceFilter> {
    if query.online_only {
        if live.is_empty() {
            return None;
        }
        let mut ids: Vec<String> = live.keys().cloned().collect();
        ids.sort();
        return Some(DeviceFilter {
            device_ids: Some(ids),
            seen_since: None,
        });
    }
    if query.all {
        return Some(DeviceFilter::default());
    }
    let minutes = query.minutes.unwrap_or(DEFAULT_ACTIVE_MINUTES).max(1);
    Some(DeviceFilter {
        device_ids: None,
        seen_since: Some(now - chrono::Duration::minutes(minutes)),
    })
}

fn device_view(device: Device, live: &HashMap<String, LivenessEntry>) -> DeviceView {
    let (status, fault_code) = match live.get(&device.device_id) {
        Some(entry) => (entry.status, entry.fault_code),
        None => (DeviceStatus::Offline, FaultCode::from_wire(&device.fault_code)),
    };
    DeviceView {
        device_id: device.device_id,
        location: device.location,
        hw_version: device.hw_version,
        status,
        fault_code,
        last_heartbeat: device.last_heartbeat,
    }
}
