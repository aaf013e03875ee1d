use std::collections::HashMap;

use async_trait::async_trait;
use edgewind_core::incident::IncidentStatus;
use edgewind_core::types::{DbId, Timestamp};
use edgewind_db::models::datapoint::CreateDataPoint;
use edgewind_db::models::device::DeviceHeartbeat;
use edgewind_db::models::fault_snapshot::CreateFaultSnapshot;
use edgewind_db::models::work_order::{CreateWorkOrder, WorkOrder};
use tokio::sync::Mutex;

use super::{IngestStore, StoreResult};

#[derive(Default)]
struct Tables {
    devices: HashMap<String, DeviceHeartbeat>,
    snapshots: Vec<CreateFaultSnapshot>,
    incidents: Vec<WorkOrder>,
    datapoints: Vec<CreateDataPoint>,
    device_touches: usize,
}

/// In-process [`IngestStore`] that keeps everything in vectors.
///
/// Used by the integration tests and handy for running the pipeline
/// without a database.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshots(&self) -> Vec<CreateFaultSnapshot> {
        self.tables.lock().await.snapshots.clone()
    }

    pub async fn incidents(&self) -> Vec<WorkOrder> {
        self.tables.lock().await.incidents.clone()
    }

    pub async fn datapoints(&self) -> Vec<CreateDataPoint> {
        self.tables.lock().await.datapoints.clone()
    }

    /// Last persisted heartbeat of a device.
    pub async fn device(&self, device_id: &str) -> Option<DeviceHeartbeat> {
        self.tables.lock().await.devices.get(device_id).cloned()
    }

    /// Number of durable liveness writes so far.
    pub async fn device_touches(&self) -> usize {
        self.tables.lock().await.device_touches
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    async fn touch_device(&self, beat: &DeviceHeartbeat) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.device_touches += 1;
        tables.devices.insert(beat.device_id.clone(), beat.clone());
        Ok(())
    }

    async fn ensure_device(&self, _device_id: &str, _location: Option<&str>) -> StoreResult<()> {
        Ok(())
    }

    async fn save_snapshots(&self, rows: &[CreateFaultSnapshot]) -> StoreResult<()> {
        self.tables.lock().await.snapshots.extend_from_slice(rows);
        Ok(())
    }

    async fn latest_incident_since(
        &self,
        device_id: &str,
        since: Timestamp,
    ) -> StoreResult<Option<WorkOrder>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .incidents
            .iter()
            .filter(|o| o.device_id == device_id && o.fault_time >= since)
            .max_by_key(|o| (o.fault_time, o.id))
            .cloned())
    }

    async fn create_incident(&self, input: &CreateWorkOrder) -> StoreResult<WorkOrder> {
        let mut tables = self.tables.lock().await;
        let order = WorkOrder {
            id: tables.incidents.len() as DbId + 1,
            device_id: input.device_id.clone(),
            fault_time: input.fault_time,
            location: input.location.clone(),
            fault_type: Some(input.fault_type.clone()),
            ai_recommendation: input.ai_recommendation.clone(),
            status: IncidentStatus::Pending.as_str().to_string(),
        };
        tables.incidents.push(order.clone());
        Ok(order)
    }

    async fn store_datapoint(&self, input: &CreateDataPoint) -> StoreResult<()> {
        self.tables.lock().await.datapoints.push(input.clone());
        Ok(())
    }
}
