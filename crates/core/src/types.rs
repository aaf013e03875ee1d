/// Row ids of the durable tables (BIGSERIAL).
pub type DbId = i64;

/// Every timestamp in the pipeline is UTC, taken on receipt.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
