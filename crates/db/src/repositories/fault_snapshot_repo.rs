//! Repository for the `fault_snapshots` table.

use edgewind_core::types::Timestamp;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::fault_snapshot::{CreateFaultSnapshot, FaultSnapshot, SnapshotFilter};

/// Column list for `fault_snapshots` queries.
const COLUMNS: &str = "\
    id, device_id, fault_code, snapshot_type, captured_at, \
    channel_id, channel_label, channel_type, current_value, \
    waveform_data, fft_data, mean_value, std_value, max_value, min_value";

/// Column list for INSERT (excludes `id`).
const INSERT_COLUMNS: &str = "\
    device_id, fault_code, snapshot_type, captured_at, \
    channel_id, channel_label, channel_type, current_value, \
    waveform_data, fft_data, mean_value, std_value, max_value, min_value";

const INSERT_ARITY: usize = 14;

/// Hard cap on rows returned by a listing.
pub const LIST_LIMIT: i64 = 1000;

/// Provides query operations for fault snapshots.
pub struct FaultSnapshotRepo;

impl FaultSnapshotRepo {
    /// Insert all channel rows of one capture in a single statement.
    pub async fn insert_batch(
        pool: &PgPool,
        rows: &[CreateFaultSnapshot],
    ) -> Result<(), sqlx::Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut query = format!("INSERT INTO fault_snapshots ({INSERT_COLUMNS}) VALUES ");
        let mut param_idx = 1usize;
        for i in 0..rows.len() {
            if i > 0 {
                query.push_str(", ");
            }
            query.push('(');
            for j in 0..INSERT_ARITY {
                if j > 0 {
                    query.push_str(", ");
                }
                query.push('$');
                query.push_str(&param_idx.to_string());
                param_idx += 1;
            }
            query.push(')');
        }

        let mut q = sqlx::query(&query);
        for row in rows {
            q = q
                .bind(&row.device_id)
                .bind(&row.fault_code)
                .bind(&row.snapshot_type)
                .bind(row.captured_at)
                .bind(row.channel_id)
                .bind(&row.channel_label)
                .bind(&row.channel_type)
                .bind(row.current_value)
                .bind(Json(&row.waveform_data))
                .bind(Json(&row.fft_data))
                .bind(row.mean_value)
                .bind(row.std_value)
                .bind(row.max_value)
                .bind(row.min_value);
        }

        q.execute(pool).await?;
        Ok(())
    }

    /// Snapshots matching `filter`, newest first. `limit` is clamped to
    /// `1..=LIST_LIMIT`.
    pub async fn list(
        pool: &PgPool,
        filter: &SnapshotFilter,
        limit: i64,
    ) -> Result<Vec<FaultSnapshot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM fault_snapshots \
             WHERE ($1::text IS NULL OR device_id = $1) \
               AND ($2::text IS NULL OR fault_code = $2) \
               AND ($3::text IS NULL OR snapshot_type = $3) \
             ORDER BY captured_at DESC, id DESC \
             LIMIT $4"
        );
        sqlx::query_as::<_, FaultSnapshot>(&query)
            .bind(&filter.device_id)
            .bind(&filter.fault_code)
            .bind(&filter.snapshot_type)
            .bind(limit.clamp(1, LIST_LIMIT))
            .fetch_all(pool)
            .await
    }

    /// All rows of one snapshot event: a device and fault code captured in
    /// `[from, until)`, oldest first.
    pub async fn list_event(
        pool: &PgPool,
        device_id: &str,
        fault_code: &str,
        from: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<FaultSnapshot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM fault_snapshots \
             WHERE device_id = $1 AND fault_code = $2 \
               AND captured_at >= $3 AND captured_at < $4 \
             ORDER BY captured_at ASC, id ASC"
        );
        sqlx::query_as::<_, FaultSnapshot>(&query)
            .bind(device_id)
            .bind(fault_code)
            .bind(from)
            .bind(until)
            .fetch_all(pool)
            .await
    }

    /// Delete the rows of one snapshot event.
    ///
    /// Returns the number of rows deleted.
    pub async fn delete_event(
        pool: &PgPool,
        device_id: &str,
        fault_code: &str,
        from: Timestamp,
        until: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM fault_snapshots \
             WHERE device_id = $1 AND fault_code = $2 \
               AND captured_at >= $3 AND captured_at < $4",
        )
        .bind(device_id)
        .bind(fault_code)
        .bind(from)
        .bind(until)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
