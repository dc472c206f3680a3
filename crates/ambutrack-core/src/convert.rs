// ── Wire-to-domain vehicle normalization ──
//
// Bridges `ambutrack_api::WireVehicle` into `VehicleRecord`. Every
// attribute resolves modern name first, then legacy name, then a default.
// Normalization is total: any JSON object yields a record (possibly with an
// empty id, which the store refuses).

use chrono::{DateTime, Utc};
use serde_json::Value;

use ambutrack_api::WireVehicle;
use ambutrack_api::models::WireTimestamp;

use crate::model::{VehicleRecord, VehicleStatus};

/// Epoch values at or above this are milliseconds, below are seconds.
/// 1e11 seconds is roughly the year 5138.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

// ── Helpers ────────────────────────────────────────────────────────

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    let millis = if epoch >= EPOCH_MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };
    DateTime::from_timestamp_millis(millis.round() as i64)
}

fn parse_timestamp(raw: &WireTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        WireTimestamp::Epoch(n) => epoch_to_datetime(*n),
        WireTimestamp::Text(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|| s.parse::<f64>().ok().and_then(epoch_to_datetime))
        }
    }
}

/// First timestamp candidate that actually parses.
fn resolve_last_update(wire: &WireVehicle) -> Option<DateTime<Utc>> {
    [&wire.last_update, &wire.last_update_legacy, &wire.timestamp]
        .into_iter()
        .flatten()
        .find_map(parse_timestamp)
}

// ── Vehicle ────────────────────────────────────────────────────────

/// Normalize a wire vehicle. `received_at` stands in for a missing or
/// unparseable timestamp.
pub fn normalize_vehicle(wire: WireVehicle, received_at: DateTime<Utc>) -> VehicleRecord {
    let last_update = resolve_last_update(&wire).unwrap_or(received_at);

    VehicleRecord {
        id: wire.ambulance_id.or(wire.id).unwrap_or_default(),
        plate_number: wire.plate_number.or(wire.plate_number_legacy),
        driver: wire.driver.or(wire.driver_legacy),
        latitude: wire.latitude.or(wire.latitude_legacy),
        longitude: wire.longitude.or(wire.longitude_legacy),
        speed: wire.speed,
        heading: wire.heading,
        accuracy: wire.accuracy,
        status: VehicleStatus::from_wire(wire.status.as_deref()),
        last_update,
    }
}

/// Normalize one payload entry. `None` only when `value` is not an object.
pub fn normalize_value(value: &Value, received_at: DateTime<Utc>) -> Option<VehicleRecord> {
    WireVehicle::from_value(value).map(|wire| normalize_vehicle(wire, received_at))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn modern_field_names() {
        let record = normalize_value(
            &json!({
                "ambulance_id": "AMB-01",
                "plateNumber": "B 1234 XY",
                "driver": "Budi",
                "latitude": -6.2,
                "longitude": 106.8,
                "speed": 42.5,
                "heading": 90,
                "accuracy": 5,
                "status": "en_route",
                "lastUpdate": "2026-03-01T10:00:00Z"
            }),
            received(),
        )
        .unwrap();

        assert_eq!(
            record,
            VehicleRecord {
                id: "AMB-01".into(),
                plate_number: Some("B 1234 XY".into()),
                driver: Some("Budi".into()),
                latitude: Some(-6.2),
                longitude: Some(106.8),
                speed: Some(42.5),
                heading: Some(90.0),
                accuracy: Some(5.0),
                status: VehicleStatus::EnRoute,
                last_update: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            }
        );
    }

    #[test]
    fn legacy_field_names() {
        let record = normalize_value(
            &json!({
                "id": "A7",
                "plate_number": "D 99 ZZ",
                "driver_name": "Sari",
                "lat": 1.5,
                "lng": 2.5,
                "last_update": 1_772_359_200
            }),
            received(),
        )
        .unwrap();

        assert_eq!(record.id, "A7");
        assert_eq!(record.plate_number.as_deref(), Some("D 99 ZZ"));
        assert_eq!(record.driver.as_deref(), Some("Sari"));
        assert_eq!(record.position(), Some((1.5, 2.5)));
        assert_eq!(record.last_update.timestamp(), 1_772_359_200);
    }

    #[test]
    fn modern_names_win_over_legacy() {
        let record = normalize_value(
            &json!({
                "ambulance_id": "AMB-1",
                "id": "row-9",
                "plateNumber": "NEW",
                "plate_number": "OLD",
                "driver": "Current",
                "driver_name": "Former",
                "latitude": 10.0,
                "lat": 20.0,
                "lastUpdate": "2026-03-01T10:00:00Z",
                "timestamp": 0
            }),
            received(),
        )
        .unwrap();

        assert_eq!(record.id, "AMB-1");
        assert_eq!(record.plate_number.as_deref(), Some("NEW"));
        assert_eq!(record.driver.as_deref(), Some("Current"));
        assert_eq!(record.latitude, Some(10.0));
        assert_eq!(record.last_update.to_rfc3339(), "2026-03-01T10:00:00+00:00");
    }

    #[test]
    fn missing_fields_use_defaults() {
        let record = normalize_value(&json!({ "id": "A1", "status": "busy" }), received()).unwrap();

        let mut expected = VehicleRecord::new("A1", received());
        expected.status = VehicleStatus::Busy;
        assert_eq!(record, expected);
    }

    #[test]
    fn epoch_seconds_and_millis() {
        let secs = normalize_value(&json!({ "id": "A", "timestamp": 1_700_000_000 }), received())
            .unwrap();
        let millis = normalize_value(
            &json!({ "id": "A", "timestamp": 1_700_000_000_123_i64 }),
            received(),
        )
        .unwrap();

        assert_eq!(secs.last_update.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(millis.last_update.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn numeric_string_timestamp() {
        let record =
            normalize_value(&json!({ "id": "A", "lastUpdate": "1700000000" }), received()).unwrap();
        assert_eq!(record.last_update.timestamp(), 1_700_000_000);
    }

    #[test]
    fn unparseable_timestamp_falls_through() {
        let record = normalize_value(
            &json!({ "id": "A", "lastUpdate": "yesterday", "timestamp": 1_700_000_000 }),
            received(),
        )
        .unwrap();
        assert_eq!(record.last_update.timestamp(), 1_700_000_000);

        let record =
            normalize_value(&json!({ "id": "A", "lastUpdate": "soon" }), received()).unwrap();
        assert_eq!(record.last_update, received());
    }

    #[test]
    fn missing_id_yields_empty_id() {
        let record = normalize_value(&json!({ "latitude": 1.0 }), received()).unwrap();
        assert!(record.id.is_empty());
    }

    #[test]
    fn non_objects_are_skipped() {
        assert!(normalize_value(&json!("A1"), received()).is_none());
        assert!(normalize_value(&json!(42), received()).is_none());
    }
}
