//! Row structs and insert DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity matching the
//! table row and the DTOs its repository accepts.

pub mod datapoint;
pub mod device;
pub mod fault_snapshot;
pub mod work_order;
