//! EdgeWind API server library.
//!
//! Exposes the building blocks (config, state, ingestion pipeline, job
//! queue, routes, WebSocket infrastructure) so integration tests and the
//! binary entrypoint can both access them.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod jobs;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod store;
pub mod ws;
