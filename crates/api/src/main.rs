use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use edgewind_core::hub::{DeviceHub, HubSettings};
use edgewind_core::knowledge::StaticFaultKnowledge;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edgewind_api::config::ServerConfig;
use edgewind_api::jobs::JobQueue;
use edgewind_api::router::build_app_router;
use edgewind_api::state::AppState;
use edgewind_api::store::PgIngestStore;
use edgewind_api::{background, ws};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edgewind_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        node_timeout_secs = config.ingest.node_timeout.as_secs(),
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = edgewind_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    edgewind_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    edgewind_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let cancel = CancellationToken::new();

    // --- WebSocket manager + keep-alive ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let keepalive_handle = ws::start_keepalive(Arc::clone(&ws_manager), cancel.clone());

    // --- Event bus + viewer fan-out ---
    let event_bus = Arc::new(edgewind_events::EventBus::default());
    let fanout = ws::LiveFanout::new(Arc::clone(&ws_manager));
    let fanout_handle = tokio::spawn(fanout.run(event_bus.subscribe()));
    tracing::info!("Event bus and viewer fan-out started");

    // --- Ingestion core ---
    let hub = Arc::new(DeviceHub::new(HubSettings::from(&config.ingest)));
    let knowledge = Arc::new(StaticFaultKnowledge);
    let normalizer = Arc::new(config.ingest.normalizer());

    // --- Background jobs ---
    let store = Arc::new(PgIngestStore::new(pool.clone()));
    let (jobs, worker_handles) = JobQueue::start(
        &config.job_settings(),
        store,
        knowledge.clone(),
        cancel.clone(),
    );

    let retention_handle = tokio::spawn(background::retention::run(
        pool.clone(),
        config.retention_days,
        cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
        hub,
        jobs,
        knowledge,
        normalizer,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Workers finish the jobs already queued before exiting.
    cancel.cancel();
    for handle in worker_handles {
        let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Background jobs stopped");

    // Dropping the last sender closes the broadcast channel and ends the fan-out.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), fanout_handle).await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    let _ = keepalive_handle.await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
