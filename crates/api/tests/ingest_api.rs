//! Integration tests for the device ingestion endpoints.
//!
//! These run the full router against an unreachable database: the
//! heartbeat path never touches PostgreSQL, and background jobs write to a
//! `MemoryStore` the tests inspect.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{body_json, get, post_json, post_json_with_headers, wait_for};
use edgewind_api::jobs::Job;
use edgewind_api::store::{IngestStore, MemoryStore, StoreResult};
use edgewind_core::fault::FaultCode;
use edgewind_core::mailbox::DeviceCommand;
use edgewind_core::types::Timestamp;
use edgewind_db::models::datapoint::CreateDataPoint;
use edgewind_db::models::device::DeviceHeartbeat;
use edgewind_db::models::fault_snapshot::CreateFaultSnapshot;
use edgewind_db::models::work_order::{CreateWorkOrder, WorkOrder};
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};

fn heartbeat(node_id: &str, fault_code: &str) -> Value {
    json!({
        "node_id": node_id,
        "status": "online",
        "fault_code": fault_code,
        "location": "Substation 3",
        "channels": [
            {
                "id": 0,
                "label": "直流母线(+)",
                "value": 375.2,
                "unit": "V",
                "type": "voltage",
                "waveform": [1.0, 2.0, 3.0, 2.0, 1.0],
                "fft_spectrum": [0.1, 0.5, 0.2]
            },
            { "id": 2, "label": "漏电流", "value": 3.5, "unit": "mA" }
        ]
    })
}

// ---------------------------------------------------------------------------
// Test: heartbeat is acknowledged and the node shows up as live
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_registers_live_node() {
    let app = common::build_test_app();

    let response = post_json(&app.router, "/api/node/heartbeat", heartbeat("N1", "E00")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let ack = body_json(response).await;
    assert_eq!(ack["success"], true);
    assert_eq!(ack["node_id"], "N1");
    assert!(ack["timestamp"].is_string());
    assert!(ack.get("command").is_none());

    let nodes = body_json(get(&app.router, "/api/get_active_nodes").await).await;
    assert_eq!(nodes["success"], true);
    assert_eq!(nodes["count"], 1);
    assert_eq!(nodes["expired_count"], 0);
    assert_eq!(nodes["nodes"][0]["node_id"], "N1");
    assert_eq!(nodes["nodes"][0]["status"], "online");
    assert_eq!(nodes["nodes"][0]["fault_code"], "E00");
    assert_eq!(nodes["nodes"][0]["location"], "Substation 3");
    // Waveforms stay out of the registry listing.
    assert!(nodes["nodes"][0]["channels"][0].get("waveform").is_none());
}

// ---------------------------------------------------------------------------
// Test: missing or malformed identity is rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_without_node_id_is_rejected() {
    let app = common::build_test_app();

    let response = post_json(&app.router, "/api/node/heartbeat", json!({ "fault_code": "E01" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "Missing node_id");

    let nodes = body_json(get(&app.router, "/api/get_active_nodes").await).await;
    assert_eq!(nodes["count"], 0);
}

#[tokio::test]
async fn numeric_node_id_is_accepted() {
    let app = common::build_test_app();

    let response = post_json(
        &app.router,
        "/api/node/heartbeat",
        json!({ "node_id": 42, "fault_code": "E00" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["node_id"], "42");
}

// ---------------------------------------------------------------------------
// Test: fault onset opens one incident and persists snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fault_onset_opens_incident_and_saves_snapshots() {
    let app = common::build_test_app();

    post_json(&app.router, "/api/node/heartbeat", heartbeat("N1", "E00")).await;
    post_json(&app.router, "/api/node/heartbeat", heartbeat("N1", "E02")).await;
    // Still faulty: no new transition.
    post_json(&app.router, "/api/node/heartbeat", heartbeat("N1", "E02")).await;

    let store = app.store.clone();
    assert!(
        wait_for(|| {
            let store = store.clone();
            async move { store.incidents().await.len() == 1 && store.snapshots().await.len() == 4 }
        })
        .await,
        "incident and snapshots should be persisted"
    );

    let incidents = app.store.incidents().await;
    assert_eq!(incidents[0].device_id, "N1");
    assert_eq!(incidents[0].status, "pending");
    let fault_type = incidents[0].fault_type.as_deref().unwrap_or_default();
    assert!(fault_type.contains("Insulation"), "unexpected fault type {fault_type}");
    assert!(incidents[0].ai_recommendation.is_some());

    // Two channels, captured once before and once after the onset.
    let snapshots = app.store.snapshots().await;
    let phases: Vec<&str> = snapshots.iter().map(|s| s.snapshot_type.as_str()).collect();
    assert_eq!(phases.iter().filter(|p| **p == "before").count(), 2);
    assert_eq!(phases.iter().filter(|p| **p == "after").count(), 2);
    assert!(snapshots.iter().all(|s| s.fault_code == "E02"));

    assert_eq!(app.state.hub.fault_state("N1").await, FaultCode::F2);
}

#[tokio::test]
async fn concurrent_onset_burst_opens_one_incident() {
    let app = common::build_test_app();
    post_json(&app.router, "/api/node/heartbeat", heartbeat("N6", "E00")).await;

    let requests: Vec<_> = (0..16)
        .map(|_| {
            let router = app.router.clone();
            tokio::spawn(async move {
                post_json(&router, "/api/node/heartbeat", heartbeat("N6", "E01"))
                    .await
                    .status()
            })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap(), StatusCode::OK);
    }

    let store = app.store.clone();
    assert!(
        wait_for(|| {
            let store = store.clone();
            async move { store.incidents().await.len() == 1 && store.snapshots().await.len() == 4 }
        })
        .await
    );
    // Give stray jobs a chance to land before checking nothing else did.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(app.store.incidents().await.len(), 1);
    let snapshots = app.store.snapshots().await;
    assert_eq!(snapshots.len(), 4);
    assert_eq!(snapshots.iter().filter(|s| s.snapshot_type == "before").count(), 2);
    assert_eq!(snapshots.iter().filter(|s| s.snapshot_type == "after").count(), 2);
}

#[tokio::test]
async fn recovery_saves_recovery_snapshots_without_incident() {
    let app = common::build_test_app();

    post_json(&app.router, "/api/node/heartbeat", heartbeat("N2", "E04")).await;
    post_json(&app.router, "/api/node/heartbeat", heartbeat("N2", "E00")).await;

    let store = app.store.clone();
    assert!(
        wait_for(|| {
            let store = store.clone();
            async move {
                store
                    .snapshots()
                    .await
                    .iter()
                    .any(|s| s.snapshot_type == "after_recovery")
            }
        })
        .await
    );

    // The first heartbeat was already faulty, so only one incident exists.
    assert!(wait_for(|| {
        let store = store.clone();
        async move { store.incidents().await.len() == 1 }
    })
    .await);
    assert_eq!(app.state.hub.fault_state("N2").await, FaultCode::Normal);
}

// ---------------------------------------------------------------------------
// Test: a pending reset is repeated until the device reports healthy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_command_is_delivered_until_acknowledged() {
    let app = common::build_test_app();

    post_json(&app.router, "/api/node/heartbeat", heartbeat("N3", "E01")).await;
    app.state.hub.set_command("N3", DeviceCommand::Reset).await;

    for _ in 0..2 {
        let ack = body_json(post_json(&app.router, "/api/node/heartbeat", heartbeat("N3", "E01")).await).await;
        assert_eq!(ack["command"], "reset");
    }

    // The acknowledging heartbeat still carries the command.
    let ack = body_json(post_json(&app.router, "/api/node/heartbeat", heartbeat("N3", "E00")).await).await;
    assert_eq!(ack["command"], "reset");

    let ack = body_json(post_json(&app.router, "/api/node/heartbeat", heartbeat("N3", "E00")).await).await;
    assert!(ack.get("command").is_none());
    assert_eq!(app.state.hub.pending_command("N3").await, None);
}

// ---------------------------------------------------------------------------
// Test: device key enforcement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn device_key_is_required_when_configured() {
    let mut config = common::test_config();
    config.device_api_key = Some("s3cret".into());
    let app = common::build_test_app_with(common::unreachable_pool(), config);

    let response = post_json(&app.router, "/api/node/heartbeat", heartbeat("N4", "E00")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");

    let response = post_json_with_headers(
        &app.router,
        "/api/node/heartbeat",
        heartbeat("N4", "E00"),
        &[("x-device-key", "wrong")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    for header in ["x-edgewind-apikey", "x-device-apikey", "x-device-key"] {
        let response = post_json_with_headers(
            &app.router,
            "/api/node/heartbeat",
            heartbeat("N4", "E00"),
            &[(header, "s3cret")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "header {header}");
    }

    // Read-only registry listing is open.
    let response = get(&app.router, "/api/get_active_nodes").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: legacy upload runs through the same pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn legacy_upload_feeds_pipeline_and_stores_datapoint() {
    let app = common::build_test_app();

    let response = post_json(
        &app.router,
        "/api/upload",
        json!({
            "device_id": "L1",
            "status": "fault",
            "fault_code": "E01",
            "waveform": [0.5, 1.5, 0.5],
            "voltage": 380.0,
            "current": 12.5
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["success"], true);
    assert!(ack.get("command").is_none());

    let store = app.store.clone();
    assert!(
        wait_for(|| {
            let store = store.clone();
            async move { store.datapoints().await.len() == 1 && store.incidents().await.len() == 1 }
        })
        .await
    );

    let point = &app.store.datapoints().await[0];
    assert_eq!(point.device_id, "L1");
    assert_eq!(point.waveform, vec![0.5, 1.5, 0.5]);
    assert_eq!(point.status.as_deref(), Some("fault"));
    assert_eq!(point.fault_code.as_deref(), Some("E01"));

    let live = app.state.hub.latest("L1", chrono::Utc::now()).await.unwrap();
    assert_eq!(live.fault_code, FaultCode::F1);
    assert_eq!(live.last_payload.normalized.bus_pos, 380.0);
    assert_eq!(live.last_payload.normalized.current, 12.5);
}

#[tokio::test]
async fn legacy_upload_without_device_id_is_rejected() {
    let app = common::build_test_app();

    let response = post_json(&app.router, "/api/upload", json!({ "fault_code": "E01" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing device_id");
}

// ---------------------------------------------------------------------------
// Test: durable device row is refreshed from heartbeats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_refreshes_device_row() {
    let app = common::build_test_app();

    post_json(&app.router, "/api/node/heartbeat", heartbeat("N5", "E03")).await;

    let store = app.store.clone();
    assert!(
        wait_for(|| {
            let store = store.clone();
            async move { store.device("N5").await.is_some() }
        })
        .await
    );
    let row = app.store.device("N5").await.unwrap();
    assert_eq!(row.status, "faulty");
    assert_eq!(row.fault_code, "E03");
    assert_eq!(row.location.as_deref(), Some("Substation 3"));
}

// ---------------------------------------------------------------------------
// Test: a saturated job queue drops work but never fails a heartbeat
// ---------------------------------------------------------------------------

/// Holds every device write until released.
struct HeldStore {
    inner: MemoryStore,
    write_started: Notify,
    release: Semaphore,
}

#[async_trait]
impl IngestStore for HeldStore {
    async fn touch_device(&self, beat: &DeviceHeartbeat) -> StoreResult<()> {
        self.write_started.notify_one();
        let _permit = self.release.acquire().await;
        self.inner.touch_device(beat).await
    }

    async fn ensure_device(&self, device_id: &str, location: Option<&str>) -> StoreResult<()> {
        self.inner.ensure_device(device_id, location).await
    }

    async fn save_snapshots(&self, rows: &[CreateFaultSnapshot]) -> StoreResult<()> {
        self.inner.save_snapshots(rows).await
    }

    async fn latest_incident_since(
        &self,
        device_id: &str,
        since: Timestamp,
    ) -> StoreResult<Option<WorkOrder>> {
        self.inner.latest_incident_since(device_id, since).await
    }

    async fn create_incident(&self, input: &CreateWorkOrder) -> StoreResult<WorkOrder> {
        self.inner.create_incident(input).await
    }

    async fn store_datapoint(&self, input: &CreateDataPoint) -> StoreResult<()> {
        self.inner.store_datapoint(input).await
    }
}

#[tokio::test]
async fn full_job_queue_rejects_jobs_but_acknowledges_heartbeats() {
    let store = Arc::new(HeldStore {
        inner: MemoryStore::new(),
        write_started: Notify::new(),
        release: Semaphore::new(0),
    });
    let mut config = common::test_config();
    config.job_workers = 1;
    config.job_queue_capacity = 1;
    let (router, state) = common::build_test_app_on(
        common::unreachable_pool(),
        config,
        Arc::clone(&store) as Arc<dyn IngestStore>,
    );

    // The first heartbeat's device write occupies the only worker.
    let response = post_json(&router, "/api/node/heartbeat", heartbeat("N7", "E00")).await;
    assert_eq!(response.status(), StatusCode::OK);
    store.write_started.notified().await;

    let filler = DeviceHeartbeat {
        device_id: "filler".into(),
        location: None,
        hw_version: None,
        status: "online".into(),
        fault_code: "E00".into(),
        seen_at: chrono::Utc::now(),
    };
    assert!(state.jobs.submit(Job::TouchDevice(filler.clone())));
    assert!(!state.jobs.submit(Job::TouchDevice(filler)));

    // The onset's snapshot and incident jobs are rejected; the device is
    // still answered and its live state still advances.
    let response = post_json(&router, "/api/node/heartbeat", heartbeat("N7", "E01")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
    assert_eq!(state.hub.fault_state("N7").await, FaultCode::F1);

    store.release.add_permits(16);
    assert!(
        wait_for(|| {
            let store = store.clone();
            async move { store.inner.device_touches().await == 2 }
        })
        .await
    );
    assert!(store.inner.incidents().await.is_empty());
    assert!(store.inner.snapshots().await.is_empty());
}
