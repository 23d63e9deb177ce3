//! The map SDK as seen by the engine.
//!
//! Everything the engine needs from a map is behind [`MapCapability`]. Calls
//! are synchronous and may fail; callers catch failures per call and keep going.

use fleetwatch_shared::geo::{self, Bounds, GeoPoint};
use fleetwatch_shared::models::{Entity, EntityId, EntityStatus, VisualSignature};
use thiserror::Error;

/// Failures reported by a map implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// The map refused the call.
    #[error("map rejected the call: {0}")]
    Rejected(String),

    /// Bounds with no area cannot be fitted.
    #[error("bounds have no area")]
    DegenerateBounds,

    /// The map is not loaded or has been torn down.
    #[error("map is not available")]
    Unavailable,

    /// The marker handle does not belong to this map.
    #[error("unknown marker handle: {0}")]
    UnknownHandle(String),
}

/// What a marker should look like. Built from the entity at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerVisual {
    pub entity_id: EntityId,
    pub label: String,
    pub category: String,
    pub status: EntityStatus,
}

impl MarkerVisual {
    pub fn for_entity(entity: &Entity) -> Self {
        MarkerVisual {
            entity_id: entity.id.clone(),
            label: entity.display_label.clone(),
            category: entity.category.clone(),
            status: entity.status,
        }
    }

    pub fn signature(&self) -> VisualSignature {
        VisualSignature {
            category: self.category.clone(),
            status: self.status,
        }
    }

    pub fn plate_color(&self) -> &'static str {
        self.status.plate_color()
    }
}

/// Camera placement returned by a bounds fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub center: GeoPoint,
    pub zoom: f64,
}

impl CameraView {
    /// Finite, in range and with a positive zoom.
    ///
    /// The `(0, 0)` sentinel is not applied here; a camera may legitimately look at the origin.
    pub fn is_sane(&self) -> bool {
        geo::in_range(self.center.lng, self.center.lat) && self.zoom.is_finite() && self.zoom > 0.0
    }
}

/// Operations the engine drives on a map.
pub trait MapCapability {
    /// Opaque marker handle owned by the caller between create and destroy.
    type Handle: Clone + std::fmt::Debug;

    fn create_marker(
        &mut self,
        position: GeoPoint,
        visual: &MarkerVisual,
    ) -> Result<Self::Handle, MapError>;

    /// Route clicks on `handle` back to `entity_id`.
    fn bind_click(&mut self, handle: &Self::Handle, entity_id: &str) -> Result<(), MapError>;

    fn move_marker(&mut self, handle: &Self::Handle, position: GeoPoint) -> Result<(), MapError>;

    fn destroy_marker(&mut self, handle: &Self::Handle) -> Result<(), MapError>;

    fn set_center(&mut self, center: GeoPoint) -> Result<(), MapError>;

    fn set_zoom(&mut self, zoom: f64) -> Result<(), MapError>;

    fn zoom(&self) -> f64;

    /// Move the camera so `bounds` is fully visible and report where it landed.
    fn fit_bounds(&mut self, bounds: Bounds) -> Result<CameraView, MapError>;
}
