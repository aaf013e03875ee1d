//! Liveness entries: what the registry knows about a reporting device.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::fault::FaultCode;
use crate::sample::TelemetrySample;
use crate::types::Timestamp;

/// Default time after the last heartbeat before a device is considered gone.
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(60);

/// Shortest timeout the registry accepts.
pub const MIN_NODE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Faulty,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Faulty => "faulty",
            DeviceStatus::Offline => "offline",
        }
    }

    /// Status of a device from its latest report: any fault wins, then an
    /// explicit `offline`, otherwise online.
    pub fn derive(fault_code: FaultCode, reported_offline: bool) -> Self {
        if !fault_code.is_normal() {
            DeviceStatus::Faulty
        } else if reported_offline {
            DeviceStatus::Offline
        } else {
            DeviceStatus::Online
        }
    }
}

/// Latest heartbeat of one device.
#[derive(Debug, Clone)]
pub struct LivenessEntry {
    pub device_id: String,
    pub last_seen: Timestamp,
    pub status: DeviceStatus,
    pub fault_code: FaultCode,
    pub last_payload: Arc<TelemetrySample>,
}

impl LivenessEntry {
    pub fn from_sample(sample: Arc<TelemetrySample>) -> Self {
        Self {
            device_id: sample.device_id.clone(),
            last_seen: sample.received_at,
            status: DeviceStatus::derive(sample.fault_code, sample.reported_offline()),
            fault_code: sample.fault_code,
            last_payload: sample,
        }
    }

    /// Live iff `now - last_seen <= timeout`.
    pub fn is_live(&self, now: Timestamp, timeout: Duration) -> bool {
        match (now - self.last_seen).to_std() {
            Ok(age) => age <= timeout,
            // Seen "in the future": clock skew, still live.
            Err(_) => true,
        }
    }
}

/// Clamp a configured timeout to [`MIN_NODE_TIMEOUT`].
pub fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.max(MIN_NODE_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::NormalizedSample;
    use chrono::Utc;

    fn entry_seen_at(last_seen: Timestamp) -> LivenessEntry {
        LivenessEntry::from_sample(Arc::new(TelemetrySample {
            device_id: "N1".into(),
            received_at: last_seen,
            reported_status: Some("online".into()),
            fault_code: FaultCode::Normal,
            location: None,
            hw_version: None,
            channels: Vec::new(),
            normalized: NormalizedSample::default(),
        }))
    }

    #[test]
    fn expiry_boundary() {
        let now = Utc::now();
        let timeout = Duration::from_secs(60);
        let eps = chrono::Duration::milliseconds(1);
        let timeout_c = chrono::Duration::seconds(60);

        assert!(!entry_seen_at(now - timeout_c - eps).is_live(now, timeout));
        assert!(entry_seen_at(now - timeout_c + eps).is_live(now, timeout));
        assert!(entry_seen_at(now - timeout_c).is_live(now, timeout));
    }

    #[test]
    fn derive_status() {
        assert_eq!(DeviceStatus::derive(FaultCode::F1, true), DeviceStatus::Faulty);
        assert_eq!(DeviceStatus::derive(FaultCode::Normal, true), DeviceStatus::Offline);
        assert_eq!(DeviceStatus::derive(FaultCode::Normal, false), DeviceStatus::Online);
    }

    #[test]
    fn timeout_is_floored() {
        assert_eq!(clamp_timeout(Duration::from_secs(3)), MIN_NODE_TIMEOUT);
        assert_eq!(clamp_timeout(Duration::from_secs(90)), Duration::from_secs(90));
    }
}
