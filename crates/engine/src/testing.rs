//! Test doubles shared by the engine's unit tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use fleetwatch_shared::geo::{Bounds, GeoPoint};
use fleetwatch_shared::models::{Entity, EntityId, EntityStatus};

use crate::map::{CameraView, MapCapability, MapError, MarkerVisual};

pub fn entity(id: &str, category: &str, status: EntityStatus) -> Entity {
    Entity {
        id: id.to_string(),
        display_label: format!("京A{id}"),
        category: category.to_string(),
        status,
    }
}

/// How [`RecordingMap::fit_bounds`] behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitBehavior {
    /// Land on the bounds center at a fixed zoom.
    Succeed(f64),
    Fail,
    /// Report a NaN camera.
    NonFinite,
}

#[derive(Debug, Clone)]
pub struct LiveMarker {
    pub visual: MarkerVisual,
    pub position: GeoPoint,
    pub clickable: bool,
}

/// A map that records every call and can be told to fail.
#[derive(Debug)]
pub struct RecordingMap {
    next_handle: u64,
    pub markers: BTreeMap<u64, LiveMarker>,
    pub creates: usize,
    pub moves: usize,
    pub destroys: usize,
    pub binds: usize,
    pub centers: Vec<GeoPoint>,
    pub zooms: Vec<f64>,
    pub fits: Vec<Bounds>,
    pub current_zoom: f64,
    pub fit_behavior: FitBehavior,
    pub fail_create_for: HashSet<EntityId>,
    pub fail_move_for: HashSet<EntityId>,
    pub fail_bind: bool,
    /// Refuse every destroy and leave the marker on the map.
    pub fail_destroy: bool,
}

impl Default for RecordingMap {
    fn default() -> Self {
        RecordingMap {
            next_handle: 1,
            markers: BTreeMap::new(),
            creates: 0,
            moves: 0,
            destroys: 0,
            binds: 0,
            centers: Vec::new(),
            zooms: Vec::new(),
            fits: Vec::new(),
            current_zoom: 11.0,
            fit_behavior: FitBehavior::Succeed(12.0),
            fail_create_for: HashSet::new(),
            fail_move_for: HashSet::new(),
            fail_bind: false,
            fail_destroy: false,
        }
    }
}

impl RecordingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_entity_ids(&self) -> BTreeSet<EntityId> {
        self.markers
            .values()
            .map(|m| m.visual.entity_id.clone())
            .collect()
    }

    pub fn marker_for(&self, entity_id: &str) -> Option<&LiveMarker> {
        self.markers
            .values()
            .find(|m| m.visual.entity_id == entity_id)
    }

    pub fn reset_counters(&mut self) {
        self.creates = 0;
        self.moves = 0;
        self.destroys = 0;
        self.binds = 0;
        self.centers.clear();
        self.zooms.clear();
        self.fits.clear();
    }
}

impl MapCapability for RecordingMap {
    type Handle = u64;

    fn create_marker(&mut self, position: GeoPoint, visual: &MarkerVisual) -> Result<u64, MapError> {
        self.creates += 1;
        if self.fail_create_for.contains(&visual.entity_id) {
            return Err(MapError::Rejected("create refused".to_string()));
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.markers.insert(
            handle,
            LiveMarker {
                visual: visual.clone(),
                position,
                clickable: false,
            },
        );
        Ok(handle)
    }

    fn bind_click(&mut self, handle: &u64, _entity_id: &str) -> Result<(), MapError> {
        self.binds += 1;
        if self.fail_bind {
            return Err(MapError::Rejected("bind refused".to_string()));
        }
        let marker = self
            .markers
            .get_mut(handle)
            .ok_or_else(|| MapError::UnknownHandle(handle.to_string()))?;
        marker.clickable = true;
        Ok(())
    }

    fn move_marker(&mut self, handle: &u64, position: GeoPoint) -> Result<(), MapError> {
        self.moves += 1;
        let marker = self
            .markers
            .get_mut(handle)
            .ok_or_else(|| MapError::UnknownHandle(handle.to_string()))?;
        if self.fail_move_for.contains(&marker.visual.entity_id) {
            return Err(MapError::Rejected("move refused".to_string()));
        }
        marker.position = position;
        Ok(())
    }

    fn destroy_marker(&mut self, handle: &u64) -> Result<(), MapError> {
        self.destroys += 1;
        if self.fail_destroy {
            return Err(MapError::Rejected("destroy refused".to_string()));
        }
        self.markers
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| MapError::UnknownHandle(handle.to_string()))
    }

    fn set_center(&mut self, center: GeoPoint) -> Result<(), MapError> {
        self.centers.push(center);
        Ok(())
    }

    fn set_zoom(&mut self, zoom: f64) -> Result<(), MapError> {
        self.zooms.push(zoom);
        self.current_zoom = zoom;
        Ok(())
    }

    fn zoom(&self) -> f64 {
        self.current_zoom
    }

    fn fit_bounds(&mut self, bounds: Bounds) -> Result<CameraView, MapError> {
        self.fits.push(bounds);
        match self.fit_behavior {
            FitBehavior::Succeed(zoom) => {
                self.current_zoom = zoom;
                Ok(CameraView {
                    center: bounds.center(),
                    zoom,
                })
            }
            FitBehavior::Fail => Err(MapError::Rejected("fit refused".to_string())),
            FitBehavior::NonFinite => Ok(CameraView {
                center: GeoPoint::new(f64::NAN, f64::NAN),
                zoom: f64::NAN,
            }),
        }
    }
}
