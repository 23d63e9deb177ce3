//! Simulated upstream feeds for running the dashboard without real trackers.
//!
//! Vehicles live inside a box around Beijing. Active vehicles drift a little
//! each frame; idle and offline ones stay where they were first seen with
//! speed 0. Now and then a tracker reports the `(0, 0)` no-fix sentinel or a
//! vehicle changes status, so the validator and marker recreation paths get
//! exercised.

use std::collections::BTreeMap;

use chrono::Utc;
use fleetwatch_engine::alarms::{AlarmSource, AlarmSourceError};
use fleetwatch_engine::telemetry::{TelemetryError, TelemetrySource};
use fleetwatch_shared::geo::GeoPoint;
use fleetwatch_shared::models::{
    Alarm, Entity, EntityId, EntityStatus, RawPosition, Severity, TelemetryFrame,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const MIN_LNG: f64 = 115.7;
pub const MAX_LNG: f64 = 117.4;
pub const MIN_LAT: f64 = 39.4;
pub const MAX_LAT: f64 = 40.2;

/// Largest per-frame move of an active vehicle, in degrees on each axis.
const DRIFT: f64 = 0.005;
const NO_FIX_CHANCE: f64 = 0.01;
const STATUS_CHANGE_CHANCE: f64 = 0.02;
const ALARM_CHANCE: f64 = 0.3;

pub const ALARM_KINDS: [&str; 4] = ["overspeed", "fatigue", "offline", "geofence"];

#[derive(Debug, Clone, Copy)]
struct Track {
    point: GeoPoint,
    altitude: f64,
    heading_deg: f64,
}

struct TelemetryState {
    rng: StdRng,
    statuses: BTreeMap<EntityId, EntityStatus>,
    tracks: BTreeMap<EntityId, Track>,
}

/// Position feed for a fixed fleet.
pub struct SimulatedTelemetry {
    state: Mutex<TelemetryState>,
}

impl SimulatedTelemetry {
    pub fn new(fleet: &[Entity]) -> Self {
        Self::with_rng(fleet, StdRng::from_entropy())
    }

    pub fn with_seed(fleet: &[Entity], seed: u64) -> Self {
        Self::with_rng(fleet, StdRng::seed_from_u64(seed))
    }

    fn with_rng(fleet: &[Entity], rng: StdRng) -> Self {
        SimulatedTelemetry {
            state: Mutex::new(TelemetryState {
                rng,
                statuses: fleet.iter().map(|e| (e.id.clone(), e.status)).collect(),
                tracks: BTreeMap::new(),
            }),
        }
    }

    /// Produce the next frame.
    pub fn next_frame(&self) -> TelemetryFrame {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut frame = TelemetryFrame::default();

        let ids: Vec<EntityId> = state.statuses.keys().cloned().collect();
        for id in ids {
            if state.rng.gen_bool(STATUS_CHANGE_CHANCE) {
                let next = random_status(&mut state.rng);
                if state.statuses.insert(id.clone(), next) != Some(next) {
                    frame.statuses.insert(id.clone(), next);
                }
            }
            let status = state
                .statuses
                .get(&id)
                .copied()
                .unwrap_or(EntityStatus::Offline);

            if state.rng.gen_bool(NO_FIX_CHANCE) {
                frame.positions.insert(id, RawPosition::at(0.0, 0.0));
                continue;
            }

            let previous = state.tracks.get(&id).copied();
            let (track, speed) = match (previous, status.is_stationary()) {
                (Some(track), true) => (track, 0.0),
                (None, true) => (random_track(&mut state.rng), 0.0),
                (Some(track), false) => {
                    let rng = &mut state.rng;
                    let point = GeoPoint::new(
                        (track.point.lng + rng.gen_range(-DRIFT..DRIFT)).clamp(MIN_LNG, MAX_LNG),
                        (track.point.lat + rng.gen_range(-DRIFT..DRIFT)).clamp(MIN_LAT, MAX_LAT),
                    );
                    let moved = Track {
                        point,
                        altitude: rng.gen_range(50.0..150.0),
                        heading_deg: rng.gen_range(0.0..360.0),
                    };
                    (moved, rng.gen_range(10.0..90.0))
                }
                (None, false) => {
                    let track = random_track(&mut state.rng);
                    (track, state.rng.gen_range(10.0..90.0))
                }
            };
            state.tracks.insert(id.clone(), track);
            frame.positions.insert(
                id,
                RawPosition::at(track.point.lng, track.point.lat)
                    .with_motion(speed, track.heading_deg)
                    .with_altitude(track.altitude),
            );
        }
        frame
    }
}

impl TelemetrySource for SimulatedTelemetry {
    async fn fetch_frame(&self) -> Result<TelemetryFrame, TelemetryError> {
        Ok(self.next_frame())
    }
}

fn random_track(rng: &mut StdRng) -> Track {
    Track {
        point: GeoPoint::new(rng.gen_range(MIN_LNG..MAX_LNG), rng.gen_range(MIN_LAT..MAX_LAT)),
        altitude: rng.gen_range(50.0..150.0),
        heading_deg: rng.gen_range(0.0..360.0),
    }
}

fn random_status(rng: &mut StdRng) -> EntityStatus {
    match rng.gen_range(0..3) {
        0 => EntityStatus::Offline,
        1 => EntityStatus::Active,
        _ => EntityStatus::Idle,
    }
}

/// Alarm feed raising random alarms against a fixed fleet.
pub struct SimulatedAlarms {
    rng: Mutex<StdRng>,
    vehicle_ids: Vec<EntityId>,
    chance: f64,
}

impl SimulatedAlarms {
    pub fn new(fleet: &[Entity]) -> Self {
        Self::with_rng(fleet, StdRng::from_entropy(), ALARM_CHANCE)
    }

    /// `chance` is the probability that a fetch returns anything at all.
    pub fn with_seed(fleet: &[Entity], seed: u64, chance: f64) -> Self {
        Self::with_rng(fleet, StdRng::seed_from_u64(seed), chance)
    }

    fn with_rng(fleet: &[Entity], rng: StdRng, chance: f64) -> Self {
        SimulatedAlarms {
            rng: Mutex::new(rng),
            vehicle_ids: fleet.iter().map(|e| e.id.clone()).collect(),
            chance: chance.clamp(0.0, 1.0),
        }
    }

    pub fn next_batch(&self) -> Vec<Alarm> {
        if self.vehicle_ids.is_empty() {
            return Vec::new();
        }
        let mut rng = self.rng.lock();
        if !rng.gen_bool(self.chance) {
            return Vec::new();
        }

        let count = rng.gen_range(1..=2);
        (0..count)
            .map(|_| {
                let entity_id = self.vehicle_ids[rng.gen_range(0..self.vehicle_ids.len())].clone();
                let kind = ALARM_KINDS[rng.gen_range(0..ALARM_KINDS.len())];
                let severity = match rng.gen_range(0..3) {
                    0 => Severity::Low,
                    1 => Severity::Medium,
                    _ => Severity::High,
                };
                Alarm {
                    id: uuid::Uuid::new_v4().to_string(),
                    entity_id,
                    kind: kind.to_string(),
                    severity,
                    raised_at: Utc::now(),
                    is_read: false,
                }
            })
            .collect()
    }
}

impl AlarmSource for SimulatedAlarms {
    async fn fetch_new_alarms(&self) -> Result<Vec<Alarm>, AlarmSourceError> {
        Ok(self.next_batch())
    }
}
