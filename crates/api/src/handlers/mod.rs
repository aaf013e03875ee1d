//! Request handlers.
//!
//! Device-facing handlers (`ingest`) feed the in-memory pipeline and never
//! wait on the database. Operator-facing handlers read and update the
//! durable tables through the `edgewind_db` repositories and map errors via
//! [`AppError`](crate::error::AppError).

pub mod devices;
pub mod ingest;
pub mod nodes;
pub mod snapshots;
pub mod work_orders;
