use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{self, GeoPoint};

pub type EntityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Offline,
    Active,
    Idle,
}

impl EntityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EntityStatus::Offline => "offline",
            EntityStatus::Active => "active",
            EntityStatus::Idle => "idle",
        }
    }

    /// License plate background used by marker visuals.
    pub fn plate_color(&self) -> &'static str {
        match self {
            EntityStatus::Offline => "#ff4d4f",
            EntityStatus::Active => "#52c41a",
            EntityStatus::Idle => "#faad14",
        }
    }

    /// Idle and offline vehicles do not move.
    pub fn is_stationary(&self) -> bool {
        !matches!(self, EntityStatus::Active)
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A tracked vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub display_label: String,
    pub category: String,
    pub status: EntityStatus,
}

impl Entity {
    pub fn signature(&self) -> VisualSignature {
        VisualSignature {
            category: self.category.clone(),
            status: self.status,
        }
    }
}

/// The parts of an entity that change how its marker looks.
/// Anything else (position, heading) is applied by moving the marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisualSignature {
    pub category: String,
    pub status: EntityStatus,
}

/// A coordinate as it arrives from upstream: a number, a numeric string, or junk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCoord {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawCoord {
    /// Numeric value, if any. Text is trimmed before parsing; empty text is not a number.
    pub fn coerce(&self) -> Option<f64> {
        match self {
            RawCoord::Number(n) => Some(*n),
            RawCoord::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    s.parse::<f64>().ok()
                }
            }
            RawCoord::Other(_) => None,
        }
    }
}

impl From<f64> for RawCoord {
    fn from(n: f64) -> Self {
        RawCoord::Number(n)
    }
}

/// Position fields as delivered by the telemetry feed. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    #[serde(default)]
    pub lng: Option<RawCoord>,
    #[serde(default)]
    pub lat: Option<RawCoord>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default, alias = "speed")]
    pub speed_kph: Option<f64>,
    #[serde(default, alias = "direction")]
    pub heading_deg: Option<f64>,
}

impl RawPosition {
    pub fn at(lng: f64, lat: f64) -> Self {
        RawPosition {
            lng: Some(RawCoord::Number(lng)),
            lat: Some(RawCoord::Number(lat)),
            ..Default::default()
        }
    }

    pub fn with_motion(mut self, speed_kph: f64, heading_deg: f64) -> Self {
        self.speed_kph = Some(speed_kph);
        self.heading_deg = Some(heading_deg);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }
}

/// Latest accepted position of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
    pub altitude: Option<f64>,
    pub speed_kph: f64,
    pub heading_deg: f64,
    pub observed_at: DateTime<Utc>,
}

impl Position {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lng, self.lat)
    }

    pub fn is_valid(&self) -> bool {
        geo::is_valid_coordinates(self.lng, self.lat)
    }
}

/// One refresh worth of upstream telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    #[serde(default)]
    pub positions: BTreeMap<EntityId, RawPosition>,
    /// Status changes reported alongside positions.
    #[serde(default)]
    pub statuses: BTreeMap<EntityId, EntityStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub entity_id: EntityId,
    pub kind: String,
    pub severity: Severity,
    pub raised_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}
