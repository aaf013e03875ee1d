//! Domain errors shared by the ingestion pipeline and the HTTP layer.

/// Errors raised by domain operations.
///
/// The API crate maps each variant onto an HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// `id` is a device id or a stringified row id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing or wrong device credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
