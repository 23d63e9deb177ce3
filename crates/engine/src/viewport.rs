//! Camera placement for a set of selected entities.
//!
//! More than one point goes through the map's own bounds fit first. When that
//! call fails or lands somewhere nonsensical (coincident points are the usual
//! culprit), the camera is placed from the bounds directly using a fixed
//! spread-to-zoom table.

use fleetwatch_shared::geo::{self, Bounds, GeoPoint};

use crate::map::{CameraView, MapCapability};
use crate::selection::SelectionSet;
use crate::store::LivePositionStore;

/// What a fit did to the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitOutcome {
    /// No valid positions among the selection.
    Skipped,
    /// Single point: center moved, zoom left alone.
    Centered(GeoPoint),
    /// The map fitted the bounds itself.
    Fitted(CameraView),
    /// Bounds placed by the step table.
    Fallback {
        center: GeoPoint,
        spread: f64,
        zoom: u8,
    },
}

/// Center and zoom for `bounds` without asking the map.
pub fn fallback_view(bounds: &Bounds) -> (GeoPoint, f64, u8) {
    let spread = bounds.spread();
    (bounds.center(), spread, geo::fallback_zoom(spread))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportFitter;

impl ViewportFitter {
    pub fn new() -> Self {
        ViewportFitter
    }

    /// Fit the camera to every selected entity with a valid position.
    pub fn fit<M: MapCapability>(
        &self,
        map: &mut M,
        selection: &SelectionSet,
        store: &LivePositionStore,
    ) -> FitOutcome {
        let points = collect_points(selection, store);
        self.fit_points(map, &points)
    }

    /// Fit the camera to `points`. Invalid points are expected to be filtered out already.
    pub fn fit_points<M: MapCapability>(&self, map: &mut M, points: &[GeoPoint]) -> FitOutcome {
        match points {
            [] => {
                tracing::debug!("No valid positions to fit, leaving camera alone");
                FitOutcome::Skipped
            }
            [only] => {
                if let Err(e) = map.set_center(*only) {
                    tracing::error!(error = %e, "Failed to center map");
                }
                tracing::debug!(
                    lng = only.lng,
                    lat = only.lat,
                    zoom = map.zoom(),
                    "Centered on single position, keeping zoom"
                );
                FitOutcome::Centered(*only)
            }
            _ => {
                let Some(bounds) = Bounds::enclosing(points.iter().copied()) else {
                    return FitOutcome::Skipped;
                };
                self.fit_bounds(map, bounds)
            }
        }
    }

    fn fit_bounds<M: MapCapability>(&self, map: &mut M, bounds: Bounds) -> FitOutcome {
        if bounds.is_finite() {
            match map.fit_bounds(bounds) {
                Ok(view) if view.is_sane() => {
                    tracing::debug!(zoom = view.zoom, "Map fitted bounds");
                    return FitOutcome::Fitted(view);
                }
                Ok(view) => {
                    tracing::warn!(?view, "Map returned an unusable camera, using fallback");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Map bounds fit failed, using fallback");
                }
            }
        } else {
            tracing::warn!(?bounds, "Non-finite bounds, using fallback");
        }

        let (center, spread, zoom) = fallback_view(&bounds);
        if let Err(e) = map.set_center(center) {
            tracing::error!(error = %e, "Fallback failed to center map");
        }
        if let Err(e) = map.set_zoom(f64::from(zoom)) {
            tracing::error!(error = %e, "Fallback failed to zoom map");
        }
        tracing::debug!(lng = center.lng, lat = center.lat, spread, zoom, "Applied fallback viewport");
        FitOutcome::Fallback {
            center,
            spread,
            zoom,
        }
    }
}

/// Valid positions of the selected ids, in selection order.
pub fn collect_points(selection: &SelectionSet, store: &LivePositionStore) -> Vec<GeoPoint> {
    selection
        .iter()
        .filter_map(|id| match store.get(id) {
            Some(position) if position.is_valid() => Some(position.point()),
            Some(_) => {
                tracing::warn!(entity_id = %id, "Stored position is invalid, skipping");
                None
            }
            None => None,
        })
        .collect()
}
