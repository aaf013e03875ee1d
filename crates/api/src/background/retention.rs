//! Periodic cleanup of raw datapoints and closed incidents.

use std::time::Duration;

use chrono::Utc;
use edgewind_db::repositories::{DataPointRepo, WorkOrderRepo};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Run the retention loop until `cancel` is triggered.
///
/// Deletes datapoints, and incidents already `resolved` or `fixed`, older
/// than `retention_days`. Open incidents are never purged.
pub async fn run(pool: PgPool, retention_days: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_days,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::days(retention_days);
                purge(&pool, cutoff).await;
            }
        }
    }
}

async fn purge(pool: &PgPool, cutoff: chrono::DateTime<Utc>) {
    match DataPointRepo::delete_older_than(pool, cutoff).await {
        Ok(0) => tracing::debug!("Retention: no datapoints to purge"),
        Ok(deleted) => tracing::info!(deleted, "Retention: purged old datapoints"),
        Err(e) => tracing::error!(error = %e, "Retention: datapoint cleanup failed"),
    }
    match WorkOrderRepo::delete_closed_before(pool, cutoff).await {
        Ok(0) => tracing::debug!("Retention: no closed incidents to purge"),
        Ok(deleted) => tracing::info!(deleted, "Retention: purged closed incidents"),
        Err(e) => tracing::error!(error = %e, "Retention: incident cleanup failed"),
    }
}
