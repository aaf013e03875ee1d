//! Integration tests for the operator endpoints and device registration.
//!
//! These need PostgreSQL: run with `DATABASE_URL` set and
//! `cargo test -- --ignored`.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use common::{body_json, delete, get, patch_json, post_json};
use edgewind_core::mailbox::DeviceCommand;
use edgewind_db::models::device::DeviceHeartbeat;
use edgewind_db::models::fault_snapshot::CreateFaultSnapshot;
use edgewind_db::models::work_order::CreateWorkOrder;
use edgewind_db::repositories::{DeviceRepo, FaultSnapshotRepo, WorkOrderRepo};
use serde_json::json;
use sqlx::PgPool;

async fn seed_incident(pool: &PgPool, device_id: &str) -> i64 {
    DeviceRepo::ensure_exists(pool, device_id, Some("Hall B"))
        .await
        .unwrap();
    WorkOrderRepo::create(
        pool,
        &CreateWorkOrder {
            device_id: device_id.to_string(),
            fault_time: Utc::now(),
            location: Some("Hall B".to_string()),
            fault_type: "绝缘故障 (Insulation Fault)".to_string(),
            ai_recommendation: None,
        },
    )
    .await
    .unwrap()
    .id
}

fn snapshot_row(device_id: &str, fault_code: &str, phase: &str) -> CreateFaultSnapshot {
    CreateFaultSnapshot {
        device_id: device_id.to_string(),
        fault_code: fault_code.to_string(),
        snapshot_type: phase.to_string(),
        captured_at: Utc::now(),
        channel_id: 0,
        channel_label: "直流母线(+)".to_string(),
        channel_type: "voltage".to_string(),
        current_value: 375.0,
        waveform_data: vec![1.0, 2.0],
        fft_data: vec![0.5],
        mean_value: 1.5,
        std_value: 0.5,
        max_value: 2.0,
        min_value: 1.0,
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn register_returns_created_then_ok(pool: PgPool) {
    let app = common::build_test_app_with(pool, common::test_config());

    let body = json!({ "device_id": "D1", "location": "Hall A", "fw_version": "2.1" });
    let response = post_json(&app.router, "/api/register", body.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["device_id"], "D1");
    assert_eq!(json["message"], "Device registered successfully");

    let response = post_json(&app.router, "/api/register", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Device updated");
}

// ---------------------------------------------------------------------------
// Work orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn closing_an_incident_queues_reset(pool: PgPool) {
    let id = seed_incident(&pool, "D2").await;
    let app = common::build_test_app_with(pool, common::test_config());

    let list = body_json(get(&app.router, "/api/work_orders").await).await;
    assert_eq!(list["data"][0]["id"], id);
    assert_eq!(list["data"][0]["status"], "pending");

    let response = patch_json(&app.router, &format!("/api/work_orders/{id}"), json!({ "status": "processing" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "processing");
    assert_eq!(app.state.hub.pending_command("D2").await, None);

    let response = patch_json(&app.router, &format!("/api/work_orders/{id}"), json!({ "status": " Fixed " })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "fixed");
    assert_eq!(app.state.hub.pending_command("D2").await, Some(DeviceCommand::Reset));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn invalid_status_and_unknown_incident_are_rejected(pool: PgPool) {
    let id = seed_incident(&pool, "D3").await;
    let app = common::build_test_app_with(pool, common::test_config());

    let response = patch_json(&app.router, &format!("/api/work_orders/{id}"), json!({ "status": "closed" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = patch_json(&app.router, "/api/work_orders/999999", json!({ "status": "fixed" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn dispatch_and_resolve_shortcuts(pool: PgPool) {
    let id = seed_incident(&pool, "D4").await;
    let app = common::build_test_app_with(pool, common::test_config());

    let response = post_json(&app.router, &format!("/api/faults/{id}/dispatch"), json!({})).await;
    assert_eq!(body_json(response).await["data"]["status"], "processing");

    let response = post_json(&app.router, &format!("/api/faults/{id}/resolve"), json!({})).await;
    assert_eq!(body_json(response).await["data"]["status"], "resolved");
    assert_eq!(app.state.hub.pending_command("D4").await, Some(DeviceCommand::Reset));
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn snapshots_filter_by_device_and_code(pool: PgPool) {
    DeviceRepo::ensure_exists(&pool, "D5", None).await.unwrap();
    DeviceRepo::ensure_exists(&pool, "D6", None).await.unwrap();
    FaultSnapshotRepo::insert_batch(
        &pool,
        &[
            snapshot_row("D5", "E02", "before"),
            snapshot_row("D5", "E02", "after"),
            snapshot_row("D5", "E04", "after"),
            snapshot_row("D6", "E02", "after"),
        ],
    )
    .await
    .unwrap();
    let app = common::build_test_app_with(pool, common::test_config());

    let json = body_json(get(&app.router, "/api/snapshots?device_id=D5&fault_code=e02").await).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["device_id"] == "D5" && r["fault_code"] == "E02"));

    let json = body_json(get(&app.router, "/api/snapshots").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 4);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn snapshot_events_group_list_and_delete(pool: PgPool) {
    DeviceRepo::ensure_exists(&pool, "D9", None).await.unwrap();
    let at = |ms: i64| Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::milliseconds(ms);
    let mut rows = Vec::new();
    for (phase, ms) in [("before", 100), ("before", 100), ("after", 400), ("after", 400), ("after", 2_000)] {
        let mut row = snapshot_row("D9", "E05", phase);
        row.captured_at = at(ms);
        rows.push(row);
    }
    FaultSnapshotRepo::insert_batch(&pool, &rows).await.unwrap();
    let app = common::build_test_app_with(pool, common::test_config());

    let json = body_json(get(&app.router, "/api/fault_snapshots?device_id=D9").await).await;
    let events = json["data"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["timestamp"], "2024-05-01 08:00:02");
    assert_eq!(events[0]["snapshot_count"], 1);
    assert_eq!(events[1]["timestamp"], "2024-05-01 08:00:00");
    assert_eq!(events[1]["snapshot_count"], 4);

    let json = body_json(get(&app.router, "/api/fault_snapshots?snapshot_type=before").await).await;
    assert_eq!(json["data"][0]["snapshot_count"], 2);

    let response = get(&app.router, "/api/fault_snapshots?snapshot_type=sideways").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let uri = "/api/fault_snapshots/event/D9/E05/2024-05-01%2008:00:00";
    let json = body_json(get(&app.router, uri).await).await;
    assert_eq!(json["data"]["snapshots"]["before"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["snapshots"]["after"].as_array().unwrap().len(), 2);
    assert!(json["data"]["snapshots"]["after_recovery"].as_array().unwrap().is_empty());

    let json = body_json(delete(&app.router, uri).await).await;
    assert_eq!(json["data"]["deleted"], 4);
    assert_eq!(get(&app.router, uri).await.status(), StatusCode::NOT_FOUND);

    let json = body_json(get(&app.router, "/api/snapshots?device_id=D9").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn fault_feed_infers_code_and_severity(pool: PgPool) {
    let id = seed_incident(&pool, "D10").await;
    let app = common::build_test_app_with(pool, common::test_config());

    let json = body_json(get(&app.router, "/api/faults").await).await;
    let fault = &json["data"][0];
    assert_eq!(fault["id"], id);
    assert_eq!(fault["fault_code"], "E02");
    assert_eq!(fault["severity"], "major");
    assert_eq!(fault["status"], "pending");

    patch_json(&app.router, &format!("/api/work_orders/{id}"), json!({ "status": "fixed" })).await;
    let json = body_json(get(&app.router, "/api/faults").await).await;
    assert_eq!(json["data"][0]["status"], "resolved");
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn device_listing_uses_live_status(pool: PgPool) {
    // D7 reported recently but is not live in this process; D8 is stale.
    for (id, seen_at) in [("D7", Utc::now()), ("D8", Utc::now() - Duration::hours(2))] {
        DeviceRepo::upsert_heartbeat(
            &pool,
            &DeviceHeartbeat {
                device_id: id.to_string(),
                location: None,
                hw_version: None,
                status: "online".to_string(),
                fault_code: "E00".to_string(),
                seen_at,
            },
        )
        .await
        .unwrap();
    }
    let app = common::build_test_app_with(pool, common::test_config());

    let json = body_json(get(&app.router, "/api/devices?online_only=true").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 0);

    let json = body_json(get(&app.router, "/api/devices").await).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["device_id"], "D7");
    assert_eq!(rows[0]["status"], "offline");

    let json = body_json(get(&app.router, "/api/devices?all=true").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    // A heartbeat makes D7 live and faulty.
    post_json(
        &app.router,
        "/api/node/heartbeat",
        json!({ "node_id": "D7", "status": "online", "fault_code": "E03" }),
    )
    .await;
    let json = body_json(get(&app.router, "/api/devices?online_only=true").await).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "faulty");
    assert_eq!(rows[0]["fault_code"], "E03");
}
