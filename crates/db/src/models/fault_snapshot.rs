//! Per-channel evidence captured around fault transitions.

use edgewind_core::snapshot::{ChannelSnapshot, SnapshotCapture};
use edgewind_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FaultSnapshot {
    pub id: DbId,
    pub device_id: String,
    pub fault_code: String,
    /// `before`, `after`, `before_recovery` or `after_recovery`.
    pub snapshot_type: String,
    pub captured_at: Timestamp,
    pub channel_id: i64,
    pub channel_label: String,
    pub channel_type: String,
    pub current_value: f64,
    pub waveform_data: serde_json::Value,
    pub fft_data: serde_json::Value,
    pub mean_value: f64,
    pub std_value: f64,
    pub max_value: f64,
    pub min_value: f64,
}

/// Filter for snapshot listings. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    pub device_id: Option<String>,
    pub fault_code: Option<String>,
    pub snapshot_type: Option<String>,
}

/// One row to insert.
#[derive(Debug, Clone)]
pub struct CreateFaultSnapshot {
    pub device_id: String,
    pub fault_code: String,
    pub snapshot_type: String,
    pub captured_at: Timestamp,
    pub channel_id: i64,
    pub channel_label: String,
    pub channel_type: String,
    pub current_value: f64,
    pub waveform_data: Vec<f64>,
    pub fft_data: Vec<f64>,
    pub mean_value: f64,
    pub std_value: f64,
    pub max_value: f64,
    pub min_value: f64,
}

impl CreateFaultSnapshot {
    /// One row per channel of a capture.
    pub fn rows_for(capture: &SnapshotCapture) -> Vec<Self> {
        capture
            .channel_records()
            .into_iter()
            .map(|channel| Self::from_channel(capture, channel))
            .collect()
    }

    fn from_channel(capture: &SnapshotCapture, channel: ChannelSnapshot) -> Self {
        Self {
            device_id: capture.sample.device_id.clone(),
            fault_code: capture.fault_code.as_wire().to_string(),
            snapshot_type: capture.phase.as_str().to_string(),
            captured_at: capture.sample.received_at,
            channel_id: channel.channel_id,
            channel_label: channel.label,
            channel_type: channel.channel_type,
            current_value: channel.value,
            waveform_data: channel.waveform,
            fft_data: channel.spectrum,
            mean_value: channel.stats.mean,
            std_value: channel.stats.std,
            max_value: channel.stats.max,
            min_value: channel.stats.min,
        }
    }
}
