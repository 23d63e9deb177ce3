//! Latest-known position per entity.
//!
//! Every write goes through coordinate validation; a record that fails is
//! dropped with a warning and the previous position stays in place. Nothing
//! invalid is ever readable from the store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fleetwatch_shared::geo::{self, GeoPoint};
use fleetwatch_shared::models::{EntityId, Position, RawCoord, RawPosition};

/// Why a raw position was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingCoordinate,
    NotNumeric,
    NotFinite,
    OutOfRange,
    /// Exactly `(0, 0)`: the tracker had no fix.
    NoFix,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::MissingCoordinate => "missing coordinate",
            RejectReason::NotNumeric => "coordinate is not numeric",
            RejectReason::NotFinite => "coordinate is NaN or infinite",
            RejectReason::OutOfRange => "coordinate out of range",
            RejectReason::NoFix => "no fix (0, 0)",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionUpdate {
    Accepted,
    Rejected(RejectReason),
}

impl PositionUpdate {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PositionUpdate::Accepted)
    }
}

/// Coerce and validate the coordinate pair of a raw record.
///
/// Agrees with [`geo::is_valid_coordinates`]; the reason only refines the answer.
pub fn validate_raw(raw: &RawPosition) -> Result<GeoPoint, RejectReason> {
    let lng = coerce(raw.lng.as_ref())?;
    let lat = coerce(raw.lat.as_ref())?;
    if !lng.is_finite() || !lat.is_finite() {
        return Err(RejectReason::NotFinite);
    }
    if !geo::in_range(lng, lat) {
        return Err(RejectReason::OutOfRange);
    }
    if geo::is_no_fix(lng, lat) {
        return Err(RejectReason::NoFix);
    }
    Ok(GeoPoint::new(lng, lat))
}

fn coerce(coord: Option<&RawCoord>) -> Result<f64, RejectReason> {
    coord
        .ok_or(RejectReason::MissingCoordinate)?
        .coerce()
        .ok_or(RejectReason::NotNumeric)
}

/// True when a raw record would be accepted by the store.
pub fn is_valid(raw: &RawPosition) -> bool {
    validate_raw(raw).is_ok()
}

#[derive(Debug, Default)]
pub struct LivePositionStore {
    positions: HashMap<EntityId, Position>,
}

impl LivePositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `raw` for `entity_id`, stamped with the current time.
    pub fn update(&mut self, entity_id: &str, raw: &RawPosition) -> PositionUpdate {
        self.update_at(entity_id, raw, Utc::now())
    }

    /// Store `raw` for `entity_id`, stamped with `now`.
    ///
    /// Optional fields absent from `raw` keep their previous value.
    pub fn update_at(
        &mut self,
        entity_id: &str,
        raw: &RawPosition,
        now: DateTime<Utc>,
    ) -> PositionUpdate {
        let point = match validate_raw(raw) {
            Ok(point) => point,
            Err(reason) => {
                tracing::warn!(entity_id, %reason, "Rejected position update");
                return PositionUpdate::Rejected(reason);
            }
        };

        let previous = self.positions.get(entity_id);
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
        let position = Position {
            lng: point.lng,
            lat: point.lat,
            altitude: finite(raw.altitude).or_else(|| previous.and_then(|p| p.altitude)),
            speed_kph: finite(raw.speed_kph)
                .or_else(|| previous.map(|p| p.speed_kph))
                .unwrap_or(0.0),
            heading_deg: finite(raw.heading_deg)
                .or_else(|| previous.map(|p| p.heading_deg))
                .unwrap_or(0.0),
            observed_at: now,
        };
        self.positions.insert(entity_id.to_string(), position);
        PositionUpdate::Accepted
    }

    pub fn get(&self, entity_id: &str) -> Option<&Position> {
        self.positions.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Position)> {
        self.positions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_accepts_valid_position() {
        let mut store = LivePositionStore::new();
        let raw = RawPosition::at(116.397428, 39.90923).with_motion(60.0, 90.0);
        assert!(store.update_at("001", &raw, t(0)).is_accepted());

        let p = store.get("001").unwrap();
        assert_eq!(p.lng, 116.397428);
        assert_eq!(p.lat, 39.90923);
        assert_eq!(p.speed_kph, 60.0);
        assert_eq!(p.heading_deg, 90.0);
        assert_eq!(p.observed_at, t(0));
    }

    #[test]
    fn test_no_implicit_creation_on_read() {
        let store = LivePositionStore::new();
        assert!(store.get("001").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejections_leave_store_unchanged() {
        let mut store = LivePositionStore::new();
        store.update_at("001", &RawPosition::at(116.0, 39.0), t(0));
        let before = *store.get("001").unwrap();

        let cases = [
            (RawPosition::at(0.0, 0.0), RejectReason::NoFix),
            (RawPosition::at(181.0, 10.0), RejectReason::OutOfRange),
            (RawPosition::at(116.0, -90.5), RejectReason::OutOfRange),
            (RawPosition::at(f64::NAN, 39.0), RejectReason::NotFinite),
            (RawPosition::at(116.0, f64::INFINITY), RejectReason::NotFinite),
            (RawPosition::default(), RejectReason::MissingCoordinate),
            (
                RawPosition {
                    lng: Some(RawCoord::Text("east".to_string())),
                    lat: Some(RawCoord::Number(39.0)),
                    ..Default::default()
                },
                RejectReason::NotNumeric,
            ),
        ];

        for (raw, reason) in cases {
            assert_eq!(
                store.update_at("001", &raw, t(10)),
                PositionUpdate::Rejected(reason)
            );
            assert_eq!(store.get("001"), Some(&before));
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rejected_first_write_creates_nothing() {
        let mut store = LivePositionStore::new();
        store.update_at("001", &RawPosition::at(0.0, 0.0), t(0));
        assert!(store.get("001").is_none());
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let mut store = LivePositionStore::new();
        let raw = RawPosition {
            lng: Some(RawCoord::Text("116.4".to_string())),
            lat: Some(RawCoord::Text("39.9".to_string())),
            ..Default::default()
        };
        assert!(store.update_at("001", &raw, t(0)).is_accepted());
        assert_eq!(store.get("001").unwrap().lng, 116.4);
    }

    #[test]
    fn test_partial_update_merges_over_previous() {
        let mut store = LivePositionStore::new();
        let first = RawPosition::at(116.0, 39.0)
            .with_motion(40.0, 180.0)
            .with_altitude(50.0);
        store.update_at("001", &first, t(0));

        store.update_at("001", &RawPosition::at(116.1, 39.1), t(3));
        let p = store.get("001").unwrap();
        assert_eq!(p.lng, 116.1);
        assert_eq!(p.speed_kph, 40.0);
        assert_eq!(p.heading_deg, 180.0);
        assert_eq!(p.altitude, Some(50.0));
        assert_eq!(p.observed_at, t(3));
    }

    #[test]
    fn test_defaults_for_first_partial_write() {
        let mut store = LivePositionStore::new();
        store.update_at("001", &RawPosition::at(116.0, 39.0), t(0));
        let p = store.get("001").unwrap();
        assert_eq!(p.speed_kph, 0.0);
        assert_eq!(p.heading_deg, 0.0);
        assert_eq!(p.altitude, None);
    }

    #[test]
    fn test_positions_are_per_entity() {
        let mut store = LivePositionStore::new();
        store.update_at("001", &RawPosition::at(116.0, 39.0), t(0));
        store.update_at("002", &RawPosition::at(117.0, 40.0), t(0));
        assert_eq!(store.get("001").unwrap().lng, 116.0);
        assert_eq!(store.get("002").unwrap().lng, 117.0);
    }

    #[test]
    fn test_validate_raw_agrees_with_geo() {
        let samples = [
            (116.397428, 39.90923),
            (0.0, 0.0),
            (181.0, 10.0),
            (-180.0, 90.0),
            (f64::NAN, 1.0),
            (0.0, 45.0),
        ];
        for (lng, lat) in samples {
            assert_eq!(
                is_valid(&RawPosition::at(lng, lat)),
                geo::is_valid_coordinates(lng, lat),
                "({lng}, {lat})"
            );
        }
    }

    #[test]
    fn test_stored_positions_are_always_valid() {
        let mut store = LivePositionStore::new();
        let inputs = [(116.0, 39.0), (0.0, 0.0), (200.0, 1.0), (116.5, 39.5)];
        for (i, (lng, lat)) in inputs.iter().enumerate() {
            store.update_at(&format!("{i:03}"), &RawPosition::at(*lng, *lat), t(0));
        }
        assert_eq!(store.len(), 2);
        assert!(store.iter().all(|(_, p)| p.is_valid()));
    }
}
