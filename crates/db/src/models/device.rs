//! Registered devices.

use edgewind_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Fallback location for devices that never reported one.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Hardware revision assumed when a device does not report one.
pub const DEFAULT_HW_VERSION: &str = "v1.0";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Device {
    pub id: DbId,
    pub device_id: String,
    pub location: String,
    pub hw_version: String,
    /// `online`, `offline` or `faulty`.
    pub status: String,
    pub fault_code: String,
    pub last_heartbeat: Option<Timestamp>,
    pub registered_at: Timestamp,
}

/// A device row plus whether the upsert inserted it.
#[derive(Debug, Clone, FromRow)]
pub struct RegisteredDevice {
    #[sqlx(flatten)]
    pub device: Device,
    pub inserted: bool,
}

/// Explicit registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDevice {
    pub device_id: String,
    pub location: Option<String>,
    pub hw_version: Option<String>,
}

/// Liveness refresh written by the heartbeat path.
#[derive(Debug, Clone)]
pub struct DeviceHeartbeat {
    pub device_id: String,
    pub location: Option<String>,
    pub hw_version: Option<String>,
    pub status: String,
    pub fault_code: String,
    pub seen_at: Timestamp,
}

/// Filters for listing devices. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    /// Restrict to these device ids.
    pub device_ids: Option<Vec<String>>,
    /// Only devices with a heartbeat at or after this instant.
    pub seen_since: Option<Timestamp>,
}
