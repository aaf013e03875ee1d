//! Viewer WebSocket infrastructure.
//!
//! Provides connection and subscription management, the keep-alive ping
//! task, the live-event fan-out, and the HTTP upgrade handler.

mod fanout;
mod handler;
mod keepalive;
pub mod manager;

pub use fanout::LiveFanout;
pub use handler::ws_handler;
pub use keepalive::start_keepalive;
pub use manager::WsManager;
