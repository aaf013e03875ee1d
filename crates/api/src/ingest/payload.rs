//! Lenient decoding of device payloads.
//!
//! Field firmware is not always careful with `Content-Type` or types, so
//! bodies are decoded from raw bytes, ids may be strings or numbers, and
//! unknown fields are ignored. Only a missing device id is an error.

use edgewind_core::channel::{number_from_json, ChannelKeywords, ChannelReading};
use edgewind_core::error::CoreError;
use edgewind_core::fault::FaultCode;
use edgewind_core::sample::Heartbeat;
use edgewind_db::models::device::RegisterDevice;
use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

/// Decode a request body as a JSON object. Anything else yields an empty
/// object, which then fails the device id check.
pub fn json_object(body: &[u8]) -> JsonObject {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => JsonObject::new(),
    }
}

/// `POST /api/node/heartbeat` body.
pub fn heartbeat_from_json(obj: &JsonObject) -> Result<Heartbeat, CoreError> {
    let device_id = device_id(obj, &["node_id", "device_id"])
        .ok_or_else(|| CoreError::Validation("Missing node_id".into()))?;

    Ok(Heartbeat {
        device_id,
        reported_status: text(obj, "status"),
        fault_code: fault_code(obj),
        location: text(obj, "location"),
        hw_version: text(obj, "hw_version"),
        channels: ChannelReading::list_from_json(obj.get("channels")),
    })
}

/// A decoded legacy `POST /api/upload` body.
#[derive(Debug, Clone)]
pub struct LegacyUpload {
    pub heartbeat: Heartbeat,
    /// The raw waveform, if the device sent one.
    pub waveform: Option<Vec<f64>>,
}

/// `POST /api/upload` body. The single waveform becomes the positive bus
/// channel; the optional scalars become the other streams.
pub fn upload_from_json(
    obj: &JsonObject,
    keywords: &ChannelKeywords,
) -> Result<LegacyUpload, CoreError> {
    let device_id = device_id(obj, &["device_id", "node_id"])
        .ok_or_else(|| CoreError::Validation("Missing device_id".into()))?;

    let waveform = obj.get("waveform").and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(number_from_json)
            .collect::<Vec<f64>>()
    });

    let bus_label = first_or(&keywords.bus, "直流");
    let mut channels = vec![ChannelReading {
        id: Some(0),
        label: bus_label.clone(),
        unit: "V".into(),
        channel_type: "voltage".into(),
        value: scalar(obj, "voltage").unwrap_or(0.0),
        waveform: waveform.clone().unwrap_or_default(),
        spectrum: Vec::new(),
    }];
    if let Some(value) = scalar(obj, "current") {
        channels.push(scalar_channel(1, first_or(&keywords.current, "电流"), "A", "current", value));
    }
    if let Some(value) = scalar(obj, "leakage") {
        channels.push(scalar_channel(2, first_or(&keywords.leakage, "漏"), "mA", "leakage", value));
    }
    if let Some(value) = scalar(obj, "voltage_neg") {
        let label = format!("{bus_label}{}", first_or(&keywords.negative, "-"));
        channels.push(scalar_channel(3, label, "V", "voltage", value));
    }

    Ok(LegacyUpload {
        heartbeat: Heartbeat {
            device_id: device_id.clone(),
            reported_status: text(obj, "status"),
            fault_code: fault_code(obj),
            location: text(obj, "location").or(Some(device_id)),
            hw_version: text(obj, "hw_version"),
            channels,
        },
        waveform,
    })
}

/// `POST /api/register` body.
pub fn register_from_json(obj: &JsonObject) -> Result<RegisterDevice, CoreError> {
    let device_id = device_id(obj, &["device_id", "node_id"])
        .ok_or_else(|| CoreError::Validation("Missing device_id".into()))?;
    Ok(RegisterDevice {
        device_id,
        location: text(obj, "location"),
        hw_version: ["hw_version", "hardware_version", "fw_version"]
            .iter()
            .find_map(|key| text(obj, key)),
    })
}

fn scalar_channel(id: i64, label: String, unit: &str, kind: &str, value: f64) -> ChannelReading {
    ChannelReading {
        id: Some(id),
        label,
        unit: unit.into(),
        channel_type: kind.into(),
        value,
        ..Default::default()
    }
}

fn first_or(words: &[String], fallback: &str) -> String {
    words
        .first()
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

fn device_id(obj: &JsonObject, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn text(obj: &JsonObject, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn scalar(obj: &JsonObject, key: &str) -> Option<f64> {
    obj.get(key).and_then(number_from_json)
}

fn fault_code(obj: &JsonObject) -> FaultCode {
    obj.get("fault_code")
        .and_then(Value::as_str)
        .map(FaultCode::from_wire)
        .unwrap_or_default()
}
