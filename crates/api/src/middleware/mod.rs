//! Request extractors that guard routes.
//!
//! - [`device_key::DeviceKey`] -- Checks the shared device API key on the
//!   ingestion endpoints.

pub mod device_key;
