//! Handlers for the device ingestion endpoints.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use edgewind_core::mailbox::DeviceCommand;
use edgewind_core::types::Timestamp;
use edgewind_db::models::datapoint::CreateDataPoint;
use edgewind_db::repositories::DeviceRepo;
use serde::Serialize;

use crate::error::AppResult;
use crate::ingest::{self, payload};
use crate::jobs::Job;
use crate::middleware::device_key::DeviceKey;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HeartbeatAck {
    pub success: bool,
    pub node_id: String,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<DeviceCommand>,
}

#[derive(Debug, Serialize)]
pub struct UploadAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<DeviceCommand>,
}

#[derive(Debug, Serialize)]
pub struct RegisterAck {
    pub success: bool,
    pub message: &'static str,
    pub device_id: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/node/heartbeat
pub async fn node_heartbeat(
    _key: DeviceKey,
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<HeartbeatAck>> {
    let received_at = Utc::now();
    let heartbeat = payload::heartbeat_from_json(&payload::json_object(&body))?;
    let reply = ingest::process(&state, heartbeat, received_at).await;

    Ok(Json(HeartbeatAck {
        success: true,
        node_id: reply.sample.device_id.clone(),
        timestamp: received_at,
        command: reply.command,
    }))
}

/// POST /api/upload
///
/// Legacy single-waveform upload, run through the same pipeline as a
/// heartbeat. The raw waveform is optionally kept as a datapoint.
pub async fn legacy_upload(
    _key: DeviceKey,
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<UploadAck>> {
    let received_at = Utc::now();
    let upload =
        payload::upload_from_json(&payload::json_object(&body), &state.config.ingest.keywords)?;
    let reply = ingest::process(&state, upload.heartbeat, received_at).await;

    if state.config.ingest.store_upload_datapoints {
        if let Some(waveform) = upload.waveform {
            let sample = &reply.sample;
            let status = if sample.fault_code.is_normal() { "normal" } else { "fault" };
            state.jobs.submit(Job::StoreDatapoint(CreateDataPoint {
                device_id: sample.device_id.clone(),
                recorded_at: received_at,
                waveform,
                status: Some(status.to_string()),
                fault_code: Some(sample.fault_code.as_wire().to_string()),
            }));
        }
    }

    Ok(Json(UploadAck {
        success: true,
        command: reply.command,
    }))
}

/// POST /api/register
///
/// Returns 201 for a new device and 200 when an existing one is refreshed.
pub async fn register_device(
    _key: DeviceKey,
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<RegisterAck>)> {
    let input = payload::register_from_json(&payload::json_object(&body))?;
    let registered = DeviceRepo::register(&state.pool, &input).await?;

    let (status, message) = if registered.inserted {
        tracing::info!(device_id = %input.device_id, "Device registered");
        (StatusCode::CREATED, "Device registered successfully")
    } else {
        tracing::debug!(device_id = %input.device_id, "Device registration refreshed");
        (StatusCode::OK, "Device updated")
    };

    Ok((
        status,
        Json(RegisterAck {
            success: true,
            message,
            device_id: registered.device.device_id,
        }),
    ))
}
