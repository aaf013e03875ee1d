//! Durable writes issued by the heartbeat path.
//!
//! Background jobs talk to storage only through [`IngestStore`], so the
//! pipeline can run against PostgreSQL in production and against
//! [`MemoryStore`] in tests.

mod memory;
mod postgres;

use async_trait::async_trait;
use edgewind_core::types::Timestamp;
use edgewind_db::models::datapoint::CreateDataPoint;
use edgewind_db::models::device::DeviceHeartbeat;
use edgewind_db::models::fault_snapshot::CreateFaultSnapshot;
use edgewind_db::models::work_order::{CreateWorkOrder, WorkOrder};

pub use memory::MemoryStore;
pub use postgres::PgIngestStore;

pub type StoreResult<T> = Result<T, sqlx::Error>;

#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Refresh the durable device row from a heartbeat.
    async fn touch_device(&self, beat: &DeviceHeartbeat) -> StoreResult<()>;

    /// Create a bare device row if none exists.
    async fn ensure_device(&self, device_id: &str, location: Option<&str>) -> StoreResult<()>;

    /// Persist the channel rows of one snapshot capture.
    async fn save_snapshots(&self, rows: &[CreateFaultSnapshot]) -> StoreResult<()>;

    /// Most recent incident of a device opened at or after `since`.
    async fn latest_incident_since(
        &self,
        device_id: &str,
        since: Timestamp,
    ) -> StoreResult<Option<WorkOrder>>;

    async fn create_incident(&self, input: &CreateWorkOrder) -> StoreResult<WorkOrder>;

    async fn store_datapoint(&self, input: &CreateDataPoint) -> StoreResult<()>;
}
