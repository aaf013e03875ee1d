#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use edgewind_core::config::IngestConfig;
use edgewind_core::hub::{DeviceHub, HubSettings};
use edgewind_core::knowledge::StaticFaultKnowledge;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use edgewind_api::config::ServerConfig;
use edgewind_api::jobs::JobQueue;
use edgewind_api::router::build_app_router;
use edgewind_api::state::AppState;
use edgewind_api::store::{IngestStore, MemoryStore};
use edgewind_api::ws::WsManager;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// no device key and a single job worker.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        device_api_key: None,
        job_workers: 1,
        job_queue_capacity: 256,
        retention_days: 30,
        ingest: IngestConfig::default(),
    }
}

/// The application under test plus handles to its internals.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Where background jobs write instead of PostgreSQL.
    pub store: Arc<MemoryStore>,
}

/// A pool that never connects. Ingestion does not need the database, and
/// endpoints that do fail fast instead of hanging.
pub fn unreachable_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy("postgres://edgewind@127.0.0.1:1/edgewind")
        .expect("lazy pool")
}

/// Build the full application with the default test config and no database.
pub fn build_test_app() -> TestApp {
    build_test_app_with(unreachable_pool(), test_config())
}

/// Build the full application around `pool`, with background jobs writing
/// to a [`MemoryStore`].
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack (CORS, request ID, timeout, tracing, panic
/// recovery).
pub fn build_test_app_with(pool: PgPool, config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let (router, state) = build_test_app_on(
        pool,
        config,
        Arc::clone(&store) as Arc<dyn IngestStore>,
    );
    TestApp {
        router,
        state,
        store,
    }
}

/// Build the full application with background jobs writing to `store`.
pub fn build_test_app_on(
    pool: PgPool,
    config: ServerConfig,
    store: Arc<dyn IngestStore>,
) -> (Router, AppState) {
    let knowledge = Arc::new(StaticFaultKnowledge);
    let (jobs, _workers) = JobQueue::start(
        &config.job_settings(),
        store,
        knowledge.clone(),
        CancellationToken::new(),
    );

    let state = AppState {
        pool,
        ws_manager: Arc::new(WsManager::new()),
        event_bus: Arc::new(edgewind_events::EventBus::default()),
        hub: Arc::new(DeviceHub::new(HubSettings::from(&config.ingest))),
        jobs,
        knowledge,
        normalizer: Arc::new(config.ingest.normalizer()),
        config: Arc::new(config.clone()),
    };

    (build_app_router(state.clone(), &config), state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    post_json_with_headers(app, uri, body, &[]).await
}

pub async fn post_json_with_headers(
    app: &Router,
    uri: &str,
    body: Value,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn patch_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::patch(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::delete(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `check` until it returns true or two seconds pass.
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
