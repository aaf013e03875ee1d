//! Per-device ingestion state.
//!
//! [`DeviceHub`] owns everything the heartbeat path mutates: the liveness
//! entry, fault state, snapshot buffer, emit and persistence gates, and the
//! command mailbox. Each device's state sits behind its own mutex, so
//! heartbeats for different devices never contend, while racing heartbeats
//! for the same device are serialized through the whole
//! read-classify-write sequence.
//!
//! The hub performs no I/O. [`DeviceHub::ingest`] returns an
//! [`IngestOutcome`] describing what the caller should persist, emit and
//! answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::config::{IngestConfig, HEARTBEAT_LOG_INTERVAL};
use crate::fault::{classify, FaultCode, Transition};
use crate::liveness::{clamp_timeout, LivenessEntry};
use crate::mailbox::{CommandSlot, DeviceCommand};
use crate::sample::TelemetrySample;
use crate::snapshot::{SnapshotBuffer, SnapshotCapture};
use crate::throttle::{interval_for_hz, WindowGate};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The subset of [`IngestConfig`] the hub needs, pre-converted.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub node_timeout: Duration,
    pub status_interval: Duration,
    pub monitor_interval: Duration,
    pub device_write_interval: Duration,
    pub snapshot_depth: usize,
}

impl From<&IngestConfig> for HubSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            node_timeout: clamp_timeout(config.node_timeout),
            status_interval: interval_for_hz(config.status_emit_hz),
            monitor_interval: interval_for_hz(config.monitor_emit_hz),
            device_write_interval: config.device_write_interval,
            snapshot_depth: config.snapshot_depth,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Per-device slot
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct DeviceSlot {
    liveness: Option<LivenessEntry>,
    fault: FaultCode,
    snapshots: SnapshotBuffer,
    status_gate: WindowGate,
    monitor_gate: WindowGate,
    persist_gate: WindowGate,
    log_gate: WindowGate,
    mailbox: CommandSlot,
}

impl DeviceSlot {
    fn new(snapshot_depth: usize) -> Self {
        Self {
            liveness: None,
            fault: FaultCode::Normal,
            snapshots: SnapshotBuffer::new(snapshot_depth),
            status_gate: WindowGate::new(),
            monitor_gate: WindowGate::new(),
            persist_gate: WindowGate::new(),
            log_gate: WindowGate::new(),
            mailbox: CommandSlot::default(),
        }
    }

    fn live_entry(&self, now: Timestamp, timeout: Duration) -> Option<&LivenessEntry> {
        self.liveness.as_ref().filter(|e| e.is_live(now, timeout))
    }

    /// A slot holds nothing a fresh one would not: no liveness entry, a
    /// healthy fault state and an empty mailbox.
    fn is_idle(&self) -> bool {
        self.liveness.is_none() && self.fault.is_normal() && self.mailbox.pending().is_none()
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Everything the caller must act on after one heartbeat.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Fault code held before this heartbeat.
    pub previous: FaultCode,
    pub transition: Transition,
    /// Samples to persist as snapshots, in order.
    pub snapshots: Vec<SnapshotCapture>,
    /// Fault for which an incident should be opened.
    pub open_incident: Option<FaultCode>,
    pub emit_status: bool,
    pub emit_monitor: bool,
    /// Whether the durable device row should be refreshed.
    pub persist_liveness: bool,
    /// Command to piggy-back on the response.
    pub command: Option<DeviceCommand>,
    /// Whether this heartbeat should be logged (rate limited per device).
    pub log_heartbeat: bool,
}

/// Result of a registry read.
#[derive(Debug, Clone, Default)]
pub struct ActiveNodes {
    pub nodes: Vec<LivenessEntry>,
    /// Entries evicted by this read.
    pub expired_count: usize,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

pub struct DeviceHub {
    settings: HubSettings,
    slots: RwLock<HashMap<String, Arc<Mutex<DeviceSlot>>>>,
}

impl DeviceHub {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            settings,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    async fn slot(&self, device_id: &str) -> Arc<Mutex<DeviceSlot>> {
        if let Some(slot) = self.slots.read().await.get(device_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(
            slots
                .entry(device_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(DeviceSlot::new(self.settings.snapshot_depth)))),
        )
    }

    async fn all_slots(&self) -> Vec<Arc<Mutex<DeviceSlot>>> {
        self.slots.read().await.values().cloned().collect()
    }

    /// Run one heartbeat through the pipeline.
    ///
    /// Under the device lock: update the liveness entry, buffer the sample,
    /// classify against the previous fault code, select snapshots, store the
    /// new fault code, then consult the emit/persist gates and the mailbox.
    pub async fn ingest(&self, sample: Arc<TelemetrySample>) -> IngestOutcome {
        let now = sample.received_at;
        let slot = self.slot(&sample.device_id).await;
        let mut slot = slot.lock().await;

        let previous = slot.fault;
        let current = sample.fault_code;

        slot.liveness = Some(LivenessEntry::from_sample(Arc::clone(&sample)));
        slot.snapshots.record(Arc::clone(&sample));

        let transition = classify(previous, current);
        let snapshots = slot.snapshots.capture(transition, &sample);
        let open_incident = match transition {
            Transition::Onset(code) => Some(code),
            _ => None,
        };
        slot.fault = current;

        let emit_status = slot.status_gate.try_pass(now, self.settings.status_interval);
        let emit_monitor = slot.monitor_gate.try_pass(now, self.settings.monitor_interval);
        let persist_liveness = slot
            .persist_gate
            .try_pass(now, self.settings.device_write_interval);
        let log_heartbeat = slot.log_gate.try_pass(now, HEARTBEAT_LOG_INTERVAL);
        let command = slot.mailbox.deliver(current);

        IngestOutcome {
            previous,
            transition,
            snapshots,
            open_incident,
            emit_status,
            emit_monitor,
            persist_liveness,
            command,
            log_heartbeat,
        }
    }

    /// All live entries. Expired entries are removed as a side effect.
    ///
    /// A device whose entry expired keeps its slot while it is faulty or has
    /// a pending command; otherwise the whole slot is dropped, so the hub
    /// holds at most one slot per live, faulty or commanded device.
    pub async fn active_nodes(&self, now: Timestamp) -> ActiveNodes {
        let timeout = self.settings.node_timeout;
        let mut result = ActiveNodes::default();
        for slot in self.all_slots().await {
            let mut slot = slot.lock().await;
            match slot.liveness.take() {
                Some(entry) if entry.is_live(now, timeout) => {
                    result.nodes.push(entry.clone());
                    slot.liveness = Some(entry);
                }
                Some(_) => result.expired_count += 1,
                None => {}
            }
        }
        result.nodes.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        self.prune_idle().await;
        result
    }

    /// Drop idle slots nobody else holds. Holding the map's write lock keeps
    /// new handles from being taken while the count is checked.
    async fn prune_idle(&self) {
        self.slots.write().await.retain(|_, slot| {
            Arc::strong_count(slot) > 1
                || slot.try_lock().map(|s| !s.is_idle()).unwrap_or(true)
        });
    }

    /// Number of devices the hub currently holds state for.
    pub async fn slot_count(&self) -> usize {
        self.slots.read().await.len()
    }

    /// The live entry for one device, if any.
    pub async fn latest(&self, device_id: &str, now: Timestamp) -> Option<LivenessEntry> {
        let slot = self.slots.read().await.get(device_id).cloned()?;
        let slot = slot.lock().await;
        slot.live_entry(now, self.settings.node_timeout).cloned()
    }

    /// Queue a command for a device. It is delivered with every heartbeat
    /// response until acknowledged.
    pub async fn set_command(&self, device_id: &str, command: DeviceCommand) {
        let slot = self.slot(device_id).await;
        slot.lock().await.mailbox.set(command);
    }

    pub async fn pending_command(&self, device_id: &str) -> Option<DeviceCommand> {
        let slot = self.slots.read().await.get(device_id).cloned()?;
        let pending = slot.lock().await.mailbox.pending();
        pending
    }

    /// Current fault code of a device (`Normal` if never seen).
    pub async fn fault_state(&self, device_id: &str) -> FaultCode {
        let Some(slot) = self.slots.read().await.get(device_id).cloned() else {
            return FaultCode::Normal;
        };
        let fault = slot.lock().await.fault;
        fault
    }
}

impl Default for DeviceHub {
    fn default() -> Self {
        Self::new(HubSettings::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
