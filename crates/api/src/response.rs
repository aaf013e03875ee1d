//! Shared response envelope types for API handlers.
//!
//! Operator endpoints use a `{ "data": ... }` envelope. Device endpoints
//! keep the `{ "success": true, ... }` shape firmware already parses.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
