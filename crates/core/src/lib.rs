//! EdgeWind domain core.
//!
//! Pure ingestion logic and the in-memory per-device state that the API
//! server drives on every heartbeat. Nothing in this crate touches the
//! database or the network.

pub mod channel;
pub mod config;
pub mod error;
pub mod fault;
pub mod hub;
pub mod incident;
pub mod knowledge;
pub mod liveness;
pub mod mailbox;
pub mod sample;
pub mod snapshot;
pub mod stats;
pub mod throttle;
pub mod types;
