// Tracking API wire types
//
// Models for the REST envelope and the vehicle objects carried by both the
// REST bootstrap endpoint and the live WebSocket. The backend has renamed
// several vehicle fields over time, so every field deserializes leniently:
// a value of the wrong JSON type is read as absent instead of failing the
// whole object.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ── Response Envelope ────────────────────────────────────────────────

/// Standard REST response envelope.
///
/// ```json
/// { "status": 200, "message": "ok", "validation": null, "data": ... }
/// ```
///
/// Every field is optional: error bodies often carry only `message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub validation: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    pub data: Option<T>,
}

// ── Vehicle ──────────────────────────────────────────────────────────

/// A vehicle object as sent by the server, before normalization.
///
/// Field pairs hold the current name and the older name for the same
/// attribute. `ambutrack-core` picks one per attribute.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireVehicle {
    /// Backend-assigned ambulance identifier (preferred).
    #[serde(default, deserialize_with = "lenient_id")]
    pub ambulance_id: Option<String>,
    /// Generic record id.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    #[serde(default, rename = "plateNumber", deserialize_with = "lenient_string")]
    pub plate_number: Option<String>,
    #[serde(default, rename = "plate_number", deserialize_with = "lenient_string")]
    pub plate_number_legacy: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub driver: Option<String>,
    #[serde(default, rename = "driver_name", deserialize_with = "lenient_string")]
    pub driver_legacy: Option<String>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub latitude: Option<f64>,
    #[serde(default, rename = "lat", deserialize_with = "lenient_number")]
    pub latitude_legacy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub longitude: Option<f64>,
    #[serde(default, rename = "lng", deserialize_with = "lenient_number")]
    pub longitude_legacy: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub heading: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub accuracy: Option<f64>,

    /// `available`, `en_route`, `busy`, or `offline`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,

    #[serde(default, rename = "lastUpdate", deserialize_with = "lenient_timestamp")]
    pub last_update: Option<WireTimestamp>,
    #[serde(default, rename = "last_update", deserialize_with = "lenient_timestamp")]
    pub last_update_legacy: Option<WireTimestamp>,
    /// Server-side sample time (used by older backends).
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<WireTimestamp>,
}

impl WireVehicle {
    /// Read a vehicle from an arbitrary JSON value.
    ///
    /// Returns `None` only when `value` is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        match Self::deserialize(value) {
            Ok(vehicle) => Some(vehicle),
            Err(e) => {
                // Only duplicate keys get here.
                tracing::debug!(error = %e, "vehicle object failed to deserialize");
                Some(Self::default())
            }
        }
    }
}

/// A timestamp in whichever form the server chose to send it.
#[derive(Debug, Clone, PartialEq)]
pub enum WireTimestamp {
    /// Epoch seconds or milliseconds.
    Epoch(f64),
    /// RFC 3339 or a numeric string.
    Text(String),
}

// ── Lenient field readers ────────────────────────────────────────────

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<WireTimestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().map(WireTimestamp::Epoch),
        Value::String(s) => Some(WireTimestamp::Text(s)),
        _ => None,
    })
}
