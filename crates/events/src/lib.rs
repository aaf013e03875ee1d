//! EdgeWind live-event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`LiveEvent`]: the `node_status_update` / `monitor_update` events
//!   viewers receive.

pub mod bus;

pub use bus::{Audience, EventBus, LiveEvent, MonitorUpdate, StatusUpdate};
