//! Heartbeat ingestion: from a decoded payload to hub state, background
//! jobs and live events.

pub mod payload;

use std::sync::Arc;

use edgewind_core::fault::Transition;
use edgewind_core::liveness::DeviceStatus;
use edgewind_core::mailbox::DeviceCommand;
use edgewind_core::sample::{Heartbeat, TelemetrySample};
use edgewind_core::types::Timestamp;
use edgewind_db::models::device::DeviceHeartbeat;
use edgewind_events::LiveEvent;

use crate::jobs::{IncidentRequest, Job};
use crate::state::AppState;

/// What the handler needs to answer the device.
#[derive(Debug, Clone)]
pub struct IngestReply {
    pub sample: Arc<TelemetrySample>,
    pub command: Option<DeviceCommand>,
}

/// Run one heartbeat through the hub and act on the outcome.
///
/// Never touches the database: durable writes are queued as jobs and may
/// be dropped under load without affecting the reply.
pub async fn process(state: &AppState, heartbeat: Heartbeat, received_at: Timestamp) -> IngestReply {
    let sample = TelemetrySample::from_heartbeat(heartbeat, &state.normalizer, received_at);
    let outcome = state.hub.ingest(Arc::clone(&sample)).await;
    let device_id = sample.device_id.as_str();

    match outcome.transition {
        Transition::Onset(code) => tracing::warn!(
            device_id,
            fault_code = %code,
            previous = %outcome.previous,
            "Fault onset"
        ),
        Transition::Recovery(code) => tracing::info!(
            device_id,
            fault_code = %code,
            "Fault recovered"
        ),
        Transition::NoOp => {}
    }
    if outcome.log_heartbeat {
        tracing::debug!(
            device_id,
            fault_code = %sample.fault_code,
            channels = sample.channels.len(),
            "Heartbeat"
        );
    }

    for capture in outcome.snapshots {
        state.jobs.submit(Job::SaveSnapshot(capture));
    }
    if let Some(fault_code) = outcome.open_incident {
        state.jobs.submit(Job::OpenIncident(IncidentRequest {
            device_id: sample.device_id.clone(),
            fault_code,
            location: sample.location.clone(),
            detected_at: received_at,
        }));
    }
    if outcome.persist_liveness {
        state.jobs.submit(Job::TouchDevice(device_heartbeat(&sample)));
    }

    if outcome.emit_status {
        state.event_bus.publish(LiveEvent::status(&sample));
    }
    if outcome.emit_monitor {
        state.event_bus.publish(LiveEvent::monitor(&sample));
    }

    IngestReply {
        command: outcome.command,
        sample,
    }
}

fn device_heartbeat(sample: &TelemetrySample) -> DeviceHeartbeat {
    DeviceHeartbeat {
        device_id: sample.device_id.clone(),
        location: sample.location.clone(),
        hw_version: sample.hw_version.clone(),
        status: DeviceStatus::derive(sample.fault_code, sample.reported_offline())
            .as_str()
            .to_string(),
        fault_code: sample.fault_code.as_wire().to_string(),
        seen_at: sample.received_at,
    }
}
