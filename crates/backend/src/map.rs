//! Server-side stand-in for the browser map.
//!
//! Keeps the marker table and camera the way the JS SDK would, so the engine's
//! reconcile and fit logic runs unchanged and clients can read the result
//! through `mapView`.

use std::collections::BTreeMap;

use fleetwatch_engine::map::{CameraView, MapCapability, MapError, MarkerVisual};
use fleetwatch_shared::geo::{Bounds, GeoPoint};
use fleetwatch_shared::models::EntityId;

pub const MIN_ZOOM: f64 = 3.0;
pub const MAX_ZOOM: f64 = 18.0;
const TILE_SIZE: f64 = 256.0;
/// Share of the viewport the fitted bounds may occupy.
const FIT_PADDING: f64 = 0.9;

/// Beijing city center.
pub const DEFAULT_CENTER: GeoPoint = GeoPoint {
    lng: 116.397428,
    lat: 39.90923,
};
pub const DEFAULT_ZOOM: f64 = 11.0;

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessMarker {
    pub visual: MarkerVisual,
    pub position: GeoPoint,
    /// Entity a click on this marker routes to, once bound.
    pub click_target: Option<EntityId>,
}

#[derive(Debug)]
pub struct HeadlessMap {
    width_px: u32,
    height_px: u32,
    center: GeoPoint,
    zoom: f64,
    next_handle: u64,
    markers: BTreeMap<u64, HeadlessMarker>,
    closed: bool,
}

impl HeadlessMap {
    pub fn new(width_px: u32, height_px: u32) -> Self {
        HeadlessMap {
            width_px: width_px.max(1),
            height_px: height_px.max(1),
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            next_handle: 1,
            markers: BTreeMap::new(),
            closed: false,
        }
    }

    pub fn camera(&self) -> CameraView {
        CameraView {
            center: self.center,
            zoom: self.zoom,
        }
    }

    pub fn markers(&self) -> impl Iterator<Item = (&u64, &HeadlessMarker)> {
        self.markers.iter()
    }

    /// Refuse every further call. Markers still registered are dropped.
    pub fn close(&mut self) {
        if !self.markers.is_empty() {
            tracing::warn!(markers = self.markers.len(), "Closing map with live markers");
        }
        self.markers.clear();
        self.closed = true;
    }

    fn ensure_open(&self) -> Result<(), MapError> {
        if self.closed {
            Err(MapError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn marker_mut(&mut self, handle: &u64) -> Result<&mut HeadlessMarker, MapError> {
        self.markers
            .get_mut(handle)
            .ok_or_else(|| MapError::UnknownHandle(handle.to_string()))
    }

    /// Zoom at which `bounds` fills the padded viewport, or `None` when it has no extent.
    fn zoom_for(&self, bounds: &Bounds) -> Option<f64> {
        let dx = (mercator_x(bounds.max_lng) - mercator_x(bounds.min_lng)).abs();
        let dy = (mercator_y(bounds.max_lat) - mercator_y(bounds.min_lat)).abs();

        let fit = |px: u32, extent: f64| {
            (extent > 0.0).then(|| (f64::from(px) * FIT_PADDING / (TILE_SIZE * extent)).log2())
        };
        let zoom = match (fit(self.width_px, dx), fit(self.height_px, dy)) {
            (Some(zx), Some(zy)) => zx.min(zy),
            (Some(z), None) | (None, Some(z)) => z,
            (None, None) => return None,
        };
        Some(zoom.floor().clamp(MIN_ZOOM, MAX_ZOOM))
    }
}

/// Web mercator x in world units `[0, 1]`.
fn mercator_x(lng: f64) -> f64 {
    (lng + 180.0) / 360.0
}

/// Web mercator y in world units `[0, 1]`, north at 0.
fn mercator_y(lat: f64) -> f64 {
    let phi = lat.to_radians();
    (1.0 - (phi.tan() + 1.0 / phi.cos()).ln() / std::f64::consts::PI) / 2.0
}

impl MapCapability for HeadlessMap {
    type Handle = u64;

    fn create_marker(&mut self, position: GeoPoint, visual: &MarkerVisual) -> Result<u64, MapError> {
        self.ensure_open()?;
        if !position.is_valid() {
            return Err(MapError::Rejected(format!(
                "invalid marker position ({}, {})",
                position.lng, position.lat
            )));
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.markers.insert(
            handle,
            HeadlessMarker {
                visual: visual.clone(),
                position,
                click_target: None,
            },
        );
        tracing::trace!(handle, entity_id = %visual.entity_id, "Created marker");
        Ok(handle)
    }

    fn bind_click(&mut self, handle: &u64, entity_id: &str) -> Result<(), MapError> {
        self.ensure_open()?;
        self.marker_mut(handle)?.click_target = Some(entity_id.to_string());
        Ok(())
    }

    fn move_marker(&mut self, handle: &u64, position: GeoPoint) -> Result<(), MapError> {
        self.ensure_open()?;
        if !position.is_valid() {
            return Err(MapError::Rejected("invalid marker position".to_string()));
        }
        self.marker_mut(handle)?.position = position;
        Ok(())
    }

    fn destroy_marker(&mut self, handle: &u64) -> Result<(), MapError> {
        self.ensure_open()?;
        self.markers
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| MapError::UnknownHandle(handle.to_string()))
    }

    fn set_center(&mut self, center: GeoPoint) -> Result<(), MapError> {
        self.ensure_open()?;
        if !center.lng.is_finite() || !center.lat.is_finite() {
            return Err(MapError::Rejected("non-finite center".to_string()));
        }
        self.center = center;
        Ok(())
    }

    fn set_zoom(&mut self, zoom: f64) -> Result<(), MapError> {
        self.ensure_open()?;
        if !zoom.is_finite() {
            return Err(MapError::Rejected("non-finite zoom".to_string()));
        }
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        Ok(())
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn fit_bounds(&mut self, bounds: Bounds) -> Result<CameraView, MapError> {
        self.ensure_open()?;
        let zoom = self.zoom_for(&bounds).ok_or(MapError::DegenerateBounds)?;
        self.center = bounds.center();
        self.zoom = zoom;
        Ok(self.camera())
    }
}
