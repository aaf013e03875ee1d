//! Repository for the `datapoints` table.

use edgewind_core::types::Timestamp;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::datapoint::{CreateDataPoint, DataPoint};

/// Column list for `datapoints` queries.
const COLUMNS: &str = "id, device_id, recorded_at, waveform, status, fault_code";

pub struct DataPointRepo;

impl DataPointRepo {
    pub async fn create(pool: &PgPool, input: &CreateDataPoint) -> Result<DataPoint, sqlx::Error> {
        let query = format!(
            "INSERT INTO datapoints (device_id, recorded_at, waveform, status, fault_code) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DataPoint>(&query)
            .bind(&input.device_id)
            .bind(input.recorded_at)
            .bind(Json(&input.waveform))
            .bind(&input.status)
            .bind(&input.fault_code)
            .fetch_one(pool)
            .await
    }

    /// Delete datapoints recorded before `cutoff`.
    ///
    /// Returns the number of rows deleted.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM datapoints WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
