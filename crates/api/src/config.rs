use edgewind_core::config::IngestConfig;

use crate::jobs::JobSettings;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Shared secret for the device endpoints. `None` disables the check.
    pub device_api_key: Option<String>,
    /// Background job workers (default: `2`, min 1).
    pub job_workers: usize,
    /// Bounded job queue size (default: `1024`, min 1).
    pub job_queue_capacity: usize,
    /// Days to keep datapoints and closed incidents (default: `30`).
    pub retention_days: i64,
    /// Heartbeat pipeline tuning.
    pub ingest: IngestConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                    |
    /// |-------------------------------|----------------------------|
    /// | `HOST`                        | `0.0.0.0`                  |
    /// | `PORT`                        | `5000`                     |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                       |
    /// | `EDGEWIND_DEVICE_API_KEY`     | unset                      |
    /// | `EDGEWIND_JOB_WORKERS`        | `2`                        |
    /// | `EDGEWIND_JOB_QUEUE_CAPACITY` | `1024`                     |
    /// | `DATA_RETENTION_DAYS`         | `30`                       |
    ///
    /// Ingestion knobs are documented on [`IngestConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let device_api_key = std::env::var("EDGEWIND_DEVICE_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let job_workers: usize = std::env::var("EDGEWIND_JOB_WORKERS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("EDGEWIND_JOB_WORKERS must be a valid usize");

        let job_queue_capacity: usize = std::env::var("EDGEWIND_JOB_QUEUE_CAPACITY")
            .unwrap_or_else(|_| "1024".into())
            .parse()
            .expect("EDGEWIND_JOB_QUEUE_CAPACITY must be a valid usize");

        let retention_days: i64 = std::env::var("DATA_RETENTION_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("DATA_RETENTION_DAYS must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            device_api_key,
            job_workers: job_workers.max(1),
            job_queue_capacity: job_queue_capacity.max(1),
            retention_days: retention_days.max(1),
            ingest: IngestConfig::from_env(),
        }
    }

    /// Settings for the background job queue.
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            workers: self.job_workers,
            capacity: self.job_queue_capacity,
            incident_dedup_window: self.ingest.incident_dedup_window,
        }
    }
}
