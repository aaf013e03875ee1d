use async_trait::async_trait;
use edgewind_core::types::Timestamp;
use edgewind_db::models::datapoint::CreateDataPoint;
use edgewind_db::models::device::DeviceHeartbeat;
use edgewind_db::models::fault_snapshot::CreateFaultSnapshot;
use edgewind_db::models::work_order::{CreateWorkOrder, WorkOrder};
use edgewind_db::repositories::{DataPointRepo, DeviceRepo, FaultSnapshotRepo, WorkOrderRepo};
use edgewind_db::DbPool;

use super::{IngestStore, StoreResult};

/// [`IngestStore`] backed by the PostgreSQL repositories.
#[derive(Clone)]
pub struct PgIngestStore {
    pool: DbPool,
}

impl PgIngestStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IngestStore for PgIngestStore {
    async fn touch_device(&self, beat: &DeviceHeartbeat) -> StoreResult<()> {
        DeviceRepo::upsert_heartbeat(&self.pool, beat).await
    }

    async fn ensure_device(&self, device_id: &str, location: Option<&str>) -> StoreResult<()> {
        DeviceRepo::ensure_exists(&self.pool, device_id, location).await
    }

    async fn save_snapshots(&self, rows: &[CreateFaultSnapshot]) -> StoreResult<()> {
        // Snapshot rows reference the device, which may not be persisted yet.
        if let Some(first) = rows.first() {
            DeviceRepo::ensure_exists(&self.pool, &first.device_id, None).await?;
        }
        FaultSnapshotRepo::insert_batch(&self.pool, rows).await
    }

    async fn latest_incident_since(
        &self,
        device_id: &str,
        since: Timestamp,
    ) -> StoreResult<Option<WorkOrder>> {
        WorkOrderRepo::find_latest_since(&self.pool, device_id, since).await
    }

    async fn create_incident(&self, input: &CreateWorkOrder) -> StoreResult<WorkOrder> {
        WorkOrderRepo::create(&self.pool, input).await
    }

    async fn store_datapoint(&self, input: &CreateDataPoint) -> StoreResult<()> {
        DataPointRepo::create(&self.pool, input).await.map(|_| ())
    }
}
