use serde::{Deserialize, Serialize};

/// Mean earth radius in meters (haversine).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub const MIN_LNG: f64 = -180.0;
pub const MAX_LNG: f64 = 180.0;
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Fallback zoom step table: (spread strictly greater than, zoom level).
/// Anything at or below the last threshold lands on `FALLBACK_MAX_ZOOM`.
const FALLBACK_ZOOM_STEPS: [(f64, u8); 6] = [
    (0.1, 10),
    (0.05, 11),
    (0.02, 12),
    (0.01, 13),
    (0.005, 14),
    (0.002, 15),
];
pub const FALLBACK_MAX_ZOOM: u8 = 16;

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Self {
        GeoPoint { lng, lat }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_coordinates(self.lng, self.lat)
    }
}

/// True when `(lng, lat)` can be put on the map.
///
/// Rejects NaN, infinities, out-of-range values and the exact origin, which
/// upstream trackers report when they have no fix.
pub fn is_valid_coordinates(lng: f64, lat: f64) -> bool {
    in_range(lng, lat) && !is_no_fix(lng, lat)
}

/// Finite and inside the lng/lat ranges. Does not apply the origin sentinel.
pub fn in_range(lng: f64, lat: f64) -> bool {
    lng.is_finite()
        && lat.is_finite()
        && (MIN_LNG..=MAX_LNG).contains(&lng)
        && (MIN_LAT..=MAX_LAT).contains(&lat)
}

/// `(0, 0)` is the "no fix" sentinel.
pub fn is_no_fix(lng: f64, lat: f64) -> bool {
    lng == 0.0 && lat == 0.0
}

/// Great-circle distance in meters.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Format a coordinate pair for display, e.g. `(116.3974, 39.9092)`.
pub fn format_coordinates(lng: f64, lat: f64, precision: usize) -> String {
    format!("({:.p$}, {:.p$})", lng, lat, p = precision)
}

/// Axis-aligned lng/lat bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Bounds {
    /// Smallest box enclosing every point. `None` for an empty input.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = Bounds {
            min_lng: first.lng,
            min_lat: first.lat,
            max_lng: first.lng,
            max_lat: first.lat,
        };
        Some(iter.fold(init, |b, p| Bounds {
            min_lng: b.min_lng.min(p.lng),
            min_lat: b.min_lat.min(p.lat),
            max_lng: b.max_lng.max(p.lng),
            max_lat: b.max_lat.max(p.lat),
        }))
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lng: (self.min_lng + self.max_lng) / 2.0,
            lat: (self.min_lat + self.max_lat) / 2.0,
        }
    }

    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Larger of the two spans, in degrees.
    pub fn spread(&self) -> f64 {
        self.lng_span().max(self.lat_span())
    }

    pub fn is_finite(&self) -> bool {
        self.min_lng.is_finite()
            && self.min_lat.is_finite()
            && self.max_lng.is_finite()
            && self.max_lat.is_finite()
    }

    /// All corners coincide.
    pub fn is_point(&self) -> bool {
        self.lng_span() == 0.0 && self.lat_span() == 0.0
    }
}

/// Discrete zoom level for a bounds spread in degrees. Wider spread, lower zoom.
pub fn fallback_zoom(spread: f64) -> u8 {
    FALLBACK_ZOOM_STEPS
        .iter()
        .find(|(threshold, _)| spread > *threshold)
        .map(|(_, zoom)| *zoom)
        .unwrap_or(FALLBACK_MAX_ZOOM)
}
