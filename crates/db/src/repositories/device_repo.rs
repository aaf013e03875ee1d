//! Repository for the `devices` table.

use sqlx::PgPool;

use crate::models::device::{
    Device, DeviceFilter, DeviceHeartbeat, RegisterDevice, RegisteredDevice, DEFAULT_HW_VERSION,
    UNKNOWN_LOCATION,
};

/// Column list for `devices` queries.
const COLUMNS: &str = "\
    id, device_id, location, hw_version, status, fault_code, \
    last_heartbeat, registered_at";

/// Provides query operations for registered devices.
pub struct DeviceRepo;

impl DeviceRepo {
    pub async fn find_by_device_id(
        pool: &PgPool,
        device_id: &str,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE device_id = $1");
        sqlx::query_as::<_, Device>(&query)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or refresh a device on explicit registration.
    ///
    /// The device is marked online with a fresh heartbeat. A missing
    /// location or hardware version keeps the stored value.
    pub async fn register(
        pool: &PgPool,
        input: &RegisterDevice,
    ) -> Result<RegisteredDevice, sqlx::Error> {
        let query = format!(
            "INSERT INTO devices (device_id, location, hw_version, status, last_heartbeat) \
             VALUES ($1, COALESCE($2, $4), COALESCE($3, $5), 'online', NOW()) \
             ON CONFLICT (device_id) DO UPDATE SET \
                location = COALESCE($2, devices.location), \
                hw_version = COALESCE($3, devices.hw_version), \
                status = 'online', \
                last_heartbeat = NOW() \
             RETURNING {COLUMNS}, (xmax = 0) AS inserted"
        );
        sqlx::query_as::<_, RegisteredDevice>(&query)
            .bind(&input.device_id)
            .bind(&input.location)
            .bind(&input.hw_version)
            .bind(UNKNOWN_LOCATION)
            .bind(DEFAULT_HW_VERSION)
            .fetch_one(pool)
            .await
    }

    /// Write the latest liveness of a device, creating the row if needed.
    pub async fn upsert_heartbeat(
        pool: &PgPool,
        beat: &DeviceHeartbeat,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO devices (device_id, location, hw_version, status, fault_code, last_heartbeat) \
             VALUES ($1, COALESCE($2, $7), COALESCE($3, $8), $4, $5, $6) \
             ON CONFLICT (device_id) DO UPDATE SET \
                location = COALESCE($2, devices.location), \
                hw_version = COALESCE($3, devices.hw_version), \
                status = EXCLUDED.status, \
                fault_code = EXCLUDED.fault_code, \
                last_heartbeat = EXCLUDED.last_heartbeat",
        )
        .bind(&beat.device_id)
        .bind(&beat.location)
        .bind(&beat.hw_version)
        .bind(&beat.status)
        .bind(&beat.fault_code)
        .bind(beat.seen_at)
        .bind(UNKNOWN_LOCATION)
        .bind(DEFAULT_HW_VERSION)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Make sure a row exists so dependent rows can reference it.
    /// An existing row is left untouched.
    pub async fn ensure_exists(
        pool: &PgPool,
        device_id: &str,
        location: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO devices (device_id, location) \
             VALUES ($1, COALESCE($2, $3)) \
             ON CONFLICT (device_id) DO NOTHING",
        )
        .bind(device_id)
        .bind(location)
        .bind(UNKNOWN_LOCATION)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List devices matching `filter`, most recently registered first.
    pub async fn list(pool: &PgPool, filter: &DeviceFilter) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM devices \
             WHERE ($1::text[] IS NULL OR device_id = ANY($1)) \
               AND ($2::timestamptz IS NULL OR last_heartbeat >= $2) \
             ORDER BY registered_at DESC, id DESC"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(&filter.device_ids)
            .bind(filter.seen_since)
            .fetch_all(pool)
            .await
    }
}
