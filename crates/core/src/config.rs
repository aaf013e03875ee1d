//! Ingestion tuning knobs.
//!
//! Every knob has a default and a floor. Values that are missing or fail to
//! parse fall back to the default rather than aborting start-up, since the
//! pipeline is fully functional with defaults.

use std::str::FromStr;
use std::time::Duration;

use crate::channel::{ChannelKeywords, ChannelNormalizer};
use crate::liveness::{clamp_timeout, DEFAULT_NODE_TIMEOUT};
use crate::snapshot::DEFAULT_BUFFER_DEPTH;

/// Defaults for the durations and rates below.
pub const DEFAULT_STATUS_EMIT_HZ: f64 = 5.0;
pub const DEFAULT_MONITOR_EMIT_HZ: f64 = 20.0;
pub const DEFAULT_WAVEFORM_POINTS: usize = 256;
pub const DEFAULT_SPECTRUM_POINTS: usize = 128;
pub const DEFAULT_DEVICE_WRITE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_INCIDENT_DEDUP_WINDOW: Duration = Duration::from_secs(2);

/// Minimum interval between per-device heartbeat log lines.
pub const HEARTBEAT_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Liveness timeout (floor 10 s).
    pub node_timeout: Duration,
    /// Status channel rate per device (floor 1 Hz).
    pub status_emit_hz: f64,
    /// Monitor channel rate per device (floor 1 Hz).
    pub monitor_emit_hz: f64,
    /// Waveform decimation cap, `0` disables.
    pub waveform_points: usize,
    /// Spectrum decimation cap, `0` disables.
    pub spectrum_points: usize,
    /// Minimum interval between durable device heartbeat writes (floor 1 s).
    pub device_write_interval: Duration,
    pub incident_dedup_window: Duration,
    /// Healthy samples kept per device (floor 1).
    pub snapshot_depth: usize,
    /// Store the waveform of legacy uploads as datapoints.
    pub store_upload_datapoints: bool,
    pub keywords: ChannelKeywords,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            node_timeout: DEFAULT_NODE_TIMEOUT,
            status_emit_hz: DEFAULT_STATUS_EMIT_HZ,
            monitor_emit_hz: DEFAULT_MONITOR_EMIT_HZ,
            waveform_points: DEFAULT_WAVEFORM_POINTS,
            spectrum_points: DEFAULT_SPECTRUM_POINTS,
            device_write_interval: DEFAULT_DEVICE_WRITE_INTERVAL,
            incident_dedup_window: DEFAULT_INCIDENT_DEDUP_WINDOW,
            snapshot_depth: DEFAULT_BUFFER_DEPTH,
            store_upload_datapoints: true,
            keywords: ChannelKeywords::default(),
        }
    }
}

impl IngestConfig {
    /// Load from process environment variables.
    ///
    /// | Env Var                            | Default        |
    /// |------------------------------------|----------------|
    /// | `EDGEWIND_NODE_TIMEOUT_SEC`        | `60` (min 10)  |
    /// | `EDGEWIND_STATUS_EMIT_HZ`          | `5` (min 1)    |
    /// | `EDGEWIND_MONITOR_EMIT_HZ`         | `20` (min 1)   |
    /// | `EDGEWIND_WAVEFORM_POINTS`         | `256`          |
    /// | `EDGEWIND_SPECTRUM_POINTS`         | `128`          |
    /// | `EDGEWIND_DEVICE_DB_UPDATE_SEC`    | `5` (min 1)    |
    /// | `EDGEWIND_INCIDENT_DEDUP_SEC`      | `2`            |
    /// | `EDGEWIND_SNAPSHOT_BUFFER_DEPTH`   | `10` (min 1)   |
    /// | `EDGEWIND_STORE_UPLOAD_DATAPOINTS` | `true`         |
    /// | `EDGEWIND_LABEL_BUS`               | `直流`         |
    /// | `EDGEWIND_LABEL_NEGATIVE`          | `-,负`         |
    /// | `EDGEWIND_LABEL_LEAKAGE`           | `漏`           |
    /// | `EDGEWIND_LABEL_CURRENT`           | `负载,电流`    |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parsed = |key: &str| get(key).and_then(|v| parse_or_none::<f64>(&v));
        let count = |key: &str, default: usize| {
            get(key)
                .and_then(|v| parse_or_none::<i64>(&v))
                .map(|n| n.max(0) as usize)
                .unwrap_or(default)
        };
        let secs = |key: &str, default: Duration, floor: f64| {
            parsed(key)
                .and_then(|v| Duration::try_from_secs_f64(v.max(floor)).ok())
                .unwrap_or(default)
        };
        let words = |key: &str, default: Vec<String>| {
            get(key)
                .map(|v| {
                    v.split(',')
                        .map(|w| w.trim().to_string())
                        .filter(|w| !w.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|w| !w.is_empty())
                .unwrap_or(default)
        };

        let keywords = ChannelKeywords {
            bus: words("EDGEWIND_LABEL_BUS", defaults.keywords.bus),
            negative: words("EDGEWIND_LABEL_NEGATIVE", defaults.keywords.negative),
            leakage: words("EDGEWIND_LABEL_LEAKAGE", defaults.keywords.leakage),
            current: words("EDGEWIND_LABEL_CURRENT", defaults.keywords.current),
        };

        Self {
            node_timeout: clamp_timeout(secs("EDGEWIND_NODE_TIMEOUT_SEC", defaults.node_timeout, 0.0)),
            status_emit_hz: parsed("EDGEWIND_STATUS_EMIT_HZ")
                .filter(|v| v.is_finite())
                .unwrap_or(defaults.status_emit_hz)
                .max(1.0),
            monitor_emit_hz: parsed("EDGEWIND_MONITOR_EMIT_HZ")
                .filter(|v| v.is_finite())
                .unwrap_or(defaults.monitor_emit_hz)
                .max(1.0),
            waveform_points: count("EDGEWIND_WAVEFORM_POINTS", defaults.waveform_points),
            spectrum_points: count("EDGEWIND_SPECTRUM_POINTS", defaults.spectrum_points),
            device_write_interval: secs(
                "EDGEWIND_DEVICE_DB_UPDATE_SEC",
                defaults.device_write_interval,
                1.0,
            ),
            incident_dedup_window: secs(
                "EDGEWIND_INCIDENT_DEDUP_SEC",
                defaults.incident_dedup_window,
                0.0,
            ),
            snapshot_depth: count("EDGEWIND_SNAPSHOT_BUFFER_DEPTH", defaults.snapshot_depth).max(1),
            store_upload_datapoints: get("EDGEWIND_STORE_UPLOAD_DATAPOINTS")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.store_upload_datapoints),
            keywords,
        }
    }

    pub fn normalizer(&self) -> ChannelNormalizer {
        ChannelNormalizer::new(
            self.keywords.clone(),
            self.waveform_points,
            self.spectrum_points,
        )
    }
}

fn parse_or_none<T: FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}
