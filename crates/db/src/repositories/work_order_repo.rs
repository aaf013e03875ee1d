//! Repository for the `work_orders` table.

use edgewind_core::incident::IncidentStatus;
use edgewind_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::work_order::{CreateWorkOrder, WorkOrder, WorkOrderWithDevice};

/// Column list for `work_orders` queries.
const COLUMNS: &str = "\
    id, device_id, fault_time, location, fault_type, ai_recommendation, status";

/// Provides query operations for incidents.
pub struct WorkOrderRepo;

impl WorkOrderRepo {
    /// Insert a new incident with status `pending`.
    pub async fn create(pool: &PgPool, input: &CreateWorkOrder) -> Result<WorkOrder, sqlx::Error> {
        let query = format!(
            "INSERT INTO work_orders (device_id, fault_time, location, fault_type, ai_recommendation) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(&input.device_id)
            .bind(input.fault_time)
            .bind(&input.location)
            .bind(&input.fault_type)
            .bind(&input.ai_recommendation)
            .fetch_one(pool)
            .await
    }

    /// The most recent incident of a device opened at or after `since`.
    pub async fn find_latest_since(
        pool: &PgPool,
        device_id: &str,
        since: Timestamp,
    ) -> Result<Option<WorkOrder>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM work_orders \
             WHERE device_id = $1 AND fault_time >= $2 \
             ORDER BY fault_time DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(device_id)
            .bind(since)
            .fetch_optional(pool)
            .await
    }

    /// All incidents, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<WorkOrder>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM work_orders ORDER BY fault_time DESC, id DESC");
        sqlx::query_as::<_, WorkOrder>(&query).fetch_all(pool).await
    }

    /// All incidents with their device's location and current fault code,
    /// newest first.
    pub async fn list_with_device(pool: &PgPool) -> Result<Vec<WorkOrderWithDevice>, sqlx::Error> {
        sqlx::query_as::<_, WorkOrderWithDevice>(
            "SELECT w.id, w.device_id, w.fault_time, w.location, w.fault_type, \
                    w.ai_recommendation, w.status, \
                    d.location AS device_location, d.fault_code AS device_fault_code \
             FROM work_orders w \
             LEFT JOIN devices d ON d.device_id = w.device_id \
             ORDER BY w.fault_time DESC, w.id DESC",
        )
        .fetch_all(pool)
        .await
    }

    /// Set the status of an incident. Returns `None` if it does not exist.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: IncidentStatus,
    ) -> Result<Option<WorkOrder>, sqlx::Error> {
        let query = format!(
            "UPDATE work_orders SET status = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Delete resolved or fixed incidents opened before `cutoff`.
    ///
    /// Returns the number of rows deleted.
    pub async fn delete_closed_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM work_orders \
             WHERE status IN ('resolved', 'fixed') AND fault_time < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
