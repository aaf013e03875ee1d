//! Fault snapshot queries.
//!
//! Rows are stored per channel. The event views group them the way an
//! operator reads them: one event per device, fault code and second.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, DurationRound, NaiveDateTime};
use edgewind_core::error::CoreError;
use edgewind_core::types::Timestamp;
use edgewind_db::models::fault_snapshot::{FaultSnapshot, SnapshotFilter};
use edgewind_db::repositories::fault_snapshot_repo::LIST_LIMIT;
use edgewind_db::repositories::FaultSnapshotRepo;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Format of the event timestamp in listings and event paths (UTC).
const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rows scanned by the event listing when no `limit` is given.
const DEFAULT_EVENT_SCAN: i64 = 500;

const SNAPSHOT_TYPES: [&str; 4] = ["before", "after", "before_recovery", "after_recovery"];

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub device_id: Option<String>,
    pub fault_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotEventQuery {
    pub device_id: Option<String>,
    pub fault_code: Option<String>,
    pub snapshot_type: Option<String>,
    /// Snapshot rows scanned, not events returned.
    pub limit: Option<i64>,
}

/// Rows captured for one device and fault code within the same second.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEvent {
    pub device_id: String,
    pub fault_code: String,
    pub timestamp: String,
    pub snapshot_count: usize,
}

/// The rows of one event, split by snapshot type.
#[derive(Debug, Default, Serialize)]
pub struct GroupedSnapshots {
    pub before: Vec<FaultSnapshot>,
    pub after: Vec<FaultSnapshot>,
    pub before_recovery: Vec<FaultSnapshot>,
    pub after_recovery: Vec<FaultSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotEventDetail {
    pub device_id: String,
    pub fault_code: String,
    pub timestamp: String,
    pub snapshots: GroupedSnapshots,
}

#[derive(Debug, Serialize)]
pub struct DeletedSnapshots {
    pub deleted: u64,
}

/// GET /api/snapshots?device_id=&fault_code=
pub async fn list_snapshots(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> AppResult<Json<DataResponse<Vec<FaultSnapshot>>>> {
    let filter = SnapshotFilter {
        device_id: non_empty(query.device_id),
        fault_code: non_empty(query.fault_code).map(|c| c.to_ascii_uppercase()),
        snapshot_type: None,
    };

    let rows = FaultSnapshotRepo::list(&state.pool, &filter, LIST_LIMIT).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// GET /api/fault_snapshots?device_id=&fault_code=&snapshot_type=&limit=
pub async fn list_snapshot_events(
    State(state): State<AppState>,
    Query(query): Query<SnapshotEventQuery>,
) -> AppResult<Json<DataResponse<Vec<SnapshotEvent>>>> {
    let snapshot_type = non_empty(query.snapshot_type).map(|t| t.to_ascii_lowercase());
    if let Some(kind) = snapshot_type.as_deref() {
        if !SNAPSHOT_TYPES.contains(&kind) {
            return Err(CoreError::Validation(format!("Unknown snapshot_type '{kind}'")).into());
        }
    }
    let filter = SnapshotFilter {
        device_id: non_empty(query.device_id),
        fault_code: non_empty(query.fault_code).map(|c| c.to_ascii_uppercase()),
        snapshot_type,
    };

    let rows = FaultSnapshotRepo::list(
        &state.pool,
        &filter,
        query.limit.unwrap_or(DEFAULT_EVENT_SCAN),
    )
    .await?;
    Ok(Json(DataResponse {
        data: group_events(&rows),
    }))
}

/// GET /api/fault_snapshots/event/{device_id}/{fault_code}/{timestamp}
pub async fn get_snapshot_event(
    State(state): State<AppState>,
    Path((device_id, fault_code, timestamp)): Path<(String, String, String)>,
) -> AppResult<Json<DataResponse<SnapshotEventDetail>>> {
    let from = parse_event_time(&timestamp)?;
    let rows = FaultSnapshotRepo::list_event(
        &state.pool,
        &device_id,
        &fault_code,
        from,
        from + Duration::seconds(1),
    )
    .await?;
    if rows.is_empty() {
        return Err(CoreError::NotFound {
            entity: "Snapshot event",
            id: format!("{device_id}/{fault_code}/{timestamp}"),
        }
        .into());
    }

    Ok(Json(DataResponse {
        data: SnapshotEventDetail {
            device_id,
            fault_code,
            timestamp: from.format(EVENT_TIME_FORMAT).to_string(),
            snapshots: group_by_type(rows),
        },
    }))
}

/// DELETE /api/fault_snapshots/event/{device_id}/{fault_code}/{timestamp}
pub async fn delete_snapshot_event(
    State(state): State<AppState>,
    Path((device_id, fault_code, timestamp)): Path<(String, String, String)>,
) -> AppResult<Json<DataResponse<DeletedSnapshots>>> {
    let from = parse_event_time(&timestamp)?;
    let deleted = FaultSnapshotRepo::delete_event(
        &state.pool,
        &device_id,
        &fault_code,
        from,
        from + Duration::seconds(1),
    )
    .await?;

    tracing::info!(
        device_id = %device_id,
        fault_code = %fault_code,
        timestamp = %timestamp,
        deleted,
        "Snapshot event deleted"
    );
    Ok(Json(DataResponse {
        data: DeletedSnapshots { deleted },
    }))
}

/// Collapse rows into events, keeping the order in which each event is
/// first seen.
pub fn group_events(rows: &[FaultSnapshot]) -> Vec<SnapshotEvent> {
    let mut events: Vec<SnapshotEvent> = Vec::new();
    for row in rows {
        let timestamp = event_second(row.captured_at)
            .format(EVENT_TIME_FORMAT)
            .to_string();
        match events.iter_mut().find(|e| {
            e.device_id == row.device_id && e.fault_code == row.fault_code && e.timestamp == timestamp
        }) {
            Some(event) => event.snapshot_count += 1,
            None => events.push(SnapshotEvent {
                device_id: row.device_id.clone(),
                fault_code: row.fault_code.clone(),
                timestamp,
                snapshot_count: 1,
            }),
        }
    }
    events
}

fn group_by_type(rows: Vec<FaultSnapshot>) -> GroupedSnapshots {
    let mut grouped = GroupedSnapshots::default();
    for row in rows {
        match row.snapshot_type.as_str() {
            "before" => grouped.before.push(row),
            "after" => grouped.after.push(row),
            "before_recovery" => grouped.before_recovery.push(row),
            "after_recovery" => grouped.after_recovery.push(row),
            _ => {}
        }
    }
    grouped
}

/// Parse an event timestamp as produced by [`group_events`].
fn parse_event_time(raw: &str) -> Result<Timestamp, CoreError> {
    NaiveDateTime::parse_from_str(raw.trim(), EVENT_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            CoreError::Validation(format!(
                "Invalid event timestamp '{raw}', expected YYYY-MM-DD HH:MM:SS"
            ))
        })
}

fn event_second(at: Timestamp) -> Timestamp {
    at.duration_trunc(Duration::seconds(1)).unwrap_or(at)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
