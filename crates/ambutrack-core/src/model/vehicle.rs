// ── Vehicle domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Operational status of an ambulance.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum VehicleStatus {
    #[default]
    Available,
    EnRoute,
    Busy,
    Offline,
}

impl VehicleStatus {
    /// Parse a wire status, falling back to `Available` for anything
    /// unrecognized.
    pub fn from_wire(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
    }

    /// Whether the vehicle can take a new dispatch.
    pub fn is_dispatchable(self) -> bool {
        matches!(self, Self::Available)
    }
}

/// The latest known state of one ambulance.
///
/// `id` is never empty once a record reaches the store. Coordinates are
/// passed through as received and may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: String,
    pub plate_number: Option<String>,
    pub driver: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub status: VehicleStatus,
    pub last_update: DateTime<Utc>,
}

impl VehicleRecord {
    /// A record carrying only an id and status, everything else defaulted.
    pub fn new(id: impl Into<String>, last_update: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            plate_number: None,
            driver: None,
            latitude: None,
            longitude: None,
            speed: None,
            heading: None,
            accuracy: None,
            status: VehicleStatus::default(),
            last_update,
        }
    }

    /// `(latitude, longitude)` when both are known.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}
