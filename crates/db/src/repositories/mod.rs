//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod datapoint_repo;
pub mod device_repo;
pub mod fault_snapshot_repo;
pub mod work_order_repo;

pub use datapoint_repo::DataPointRepo;
pub use device_repo::DeviceRepo;
pub use fault_snapshot_repo::FaultSnapshotRepo;
pub use work_order_repo::WorkOrderRepo;
