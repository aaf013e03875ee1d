//! Shared-secret check for device endpoints.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use edgewind_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Headers a device may carry its key in, in lookup order.
pub const DEVICE_KEY_HEADERS: [&str; 3] = ["x-edgewind-apikey", "x-device-apikey", "x-device-key"];

static UNPROTECTED_WARNED: AtomicBool = AtomicBool::new(false);

/// Proof that the request passed the device key check.
///
/// When no key is configured every request passes, and a warning is
/// logged once.
///
/// ```ignore
/// async fn heartbeat(_key: DeviceKey, State(state): State<AppState>) -> AppResult<Json<Value>> {
///     ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DeviceKey;

impl FromRequestParts<AppState> for DeviceKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.device_api_key.as_deref() else {
            if !UNPROTECTED_WARNED.swap(true, Ordering::Relaxed) {
                tracing::warn!("EDGEWIND_DEVICE_API_KEY is not set, device endpoints are unauthenticated");
            }
            return Ok(DeviceKey);
        };

        let provided = DEVICE_KEY_HEADERS.iter().find_map(|name| {
            parts
                .headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        });

        match provided {
            Some(key) if key == expected => Ok(DeviceKey),
            _ => Err(AppError::Core(CoreError::Unauthorized(
                "Invalid or missing device API key".into(),
            ))),
        }
    }
}
