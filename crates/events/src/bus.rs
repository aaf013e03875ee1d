//! In-process live-event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries [`LiveEvent`]s from the ingestion path to the viewer
//! fan-out. Publishing never blocks: a receiver that falls behind loses the
//! oldest events, which is acceptable for live telemetry.

use edgewind_core::channel::{NormalizedSample, SampleMetrics};
use edgewind_core::fault::FaultCode;
use edgewind_core::liveness::{DeviceStatus, LivenessEntry};
use edgewind_core::sample::TelemetrySample;
use edgewind_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Compact health summary of one device.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub node_id: String,
    pub status: DeviceStatus,
    pub fault_code: FaultCode,
    pub timestamp: Timestamp,
    pub metrics: SampleMetrics,
}

/// Full normalized sample of one device, for its subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorUpdate {
    pub node_id: String,
    pub fault_code: FaultCode,
    pub timestamp: Timestamp,
    pub data: NormalizedSample,
    /// Set on the catch-up sample sent when a viewer subscribes, so it is
    /// not mistaken for a new transition.
    pub is_initial: bool,
}

/// Who should receive a [`LiveEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience<'a> {
    /// Every connected viewer.
    Everyone,
    /// Viewers subscribed to this device.
    Subscribers(&'a str),
}

/// An outbound real-time event. Serializes with a `type` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    NodeStatusUpdate(StatusUpdate),
    MonitorUpdate(MonitorUpdate),
}

impl LiveEvent {
    /// Status event for a freshly ingested sample.
    pub fn status(sample: &TelemetrySample) -> Self {
        LiveEvent::NodeStatusUpdate(StatusUpdate {
            node_id: sample.device_id.clone(),
            status: DeviceStatus::derive(sample.fault_code, sample.reported_offline()),
            fault_code: sample.fault_code,
            timestamp: sample.received_at,
            metrics: sample.normalized.metrics(),
        })
    }

    /// Monitor event for a freshly ingested sample.
    pub fn monitor(sample: &TelemetrySample) -> Self {
        LiveEvent::MonitorUpdate(MonitorUpdate {
            node_id: sample.device_id.clone(),
            fault_code: sample.fault_code,
            timestamp: sample.received_at,
            data: sample.normalized.clone(),
            is_initial: false,
        })
    }

    /// Catch-up monitor event built from the registry.
    pub fn initial_monitor(entry: &LivenessEntry) -> Self {
        LiveEvent::MonitorUpdate(MonitorUpdate {
            node_id: entry.device_id.clone(),
            fault_code: entry.fault_code,
            timestamp: entry.last_seen,
            data: entry.last_payload.normalized.clone(),
            is_initial: true,
        })
    }

    pub fn device_id(&self) -> &str {
        match self {
            LiveEvent::NodeStatusUpdate(e) => &e.node_id,
            LiveEvent::MonitorUpdate(e) => &e.node_id,
        }
    }

    pub fn audience(&self) -> Audience<'_> {
        match self {
            LiveEvent::NodeStatusUpdate(_) => Audience::Everyone,
            LiveEvent::MonitorUpdate(e) => Audience::Subscribers(&e.node_id),
        }
    }

    /// JSON text of the event, as sent to viewers.
    pub fn to_json(&self) -> String {
        // Every field is a plain string, number, or array of numbers.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
///
/// # Usage
///
/// ```rust
/// use edgewind_events::bus::EventBus;
///
/// let bus = EventBus::default();
/// let _rx = bus.subscribe();
/// assert_eq!(bus.receiver_count(), 1);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<LiveEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: LiveEvent) {
        // The only error is "no receivers".
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
