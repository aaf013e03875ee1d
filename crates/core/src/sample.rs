//! One accepted heartbeat, shaped for the in-memory pipeline.

use std::sync::Arc;

use crate::channel::{ChannelNormalizer, ChannelReading, NormalizedSample};
use crate::fault::FaultCode;
use crate::types::Timestamp;

/// Validated heartbeat input, before normalization.
#[derive(Debug, Clone, Default)]
pub struct Heartbeat {
    pub device_id: String,
    /// Status string the device reported (`online`, `offline`, ...), if any.
    pub reported_status: Option<String>,
    pub fault_code: FaultCode,
    pub location: Option<String>,
    pub hw_version: Option<String>,
    pub channels: Vec<ChannelReading>,
}

/// A heartbeat after normalization. Shared between the liveness entry, the
/// snapshot buffer and queued persistence jobs, so it is held behind `Arc`.
#[derive(Debug, Clone)]
pub struct TelemetrySample {
    pub device_id: String,
    pub received_at: Timestamp,
    pub reported_status: Option<String>,
    pub fault_code: FaultCode,
    pub location: Option<String>,
    pub hw_version: Option<String>,
    /// Full-resolution channels, used for snapshots.
    pub channels: Vec<ChannelReading>,
    /// Decimated streams, used for live viewers.
    pub normalized: NormalizedSample,
}

impl TelemetrySample {
    pub fn from_heartbeat(
        heartbeat: Heartbeat,
        normalizer: &ChannelNormalizer,
        received_at: Timestamp,
    ) -> Arc<Self> {
        let normalized = normalizer.normalize(&heartbeat.channels);
        Arc::new(Self {
            device_id: heartbeat.device_id,
            received_at,
            reported_status: heartbeat.reported_status,
            fault_code: heartbeat.fault_code,
            location: heartbeat.location,
            hw_version: heartbeat.hw_version,
            channels: heartbeat.channels,
            normalized,
        })
    }

    /// Whether the device explicitly reported itself offline.
    pub fn reported_offline(&self) -> bool {
        self.reported_status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("offline"))
    }
}
