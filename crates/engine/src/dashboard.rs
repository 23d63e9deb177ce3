//! One live map view: fleet, positions, selection and the map they are drawn on.
//!
//! Everything here runs inside a single tick handler. `refresh` applies one
//! telemetry frame and reconciles markers; selection changes reconcile and then
//! refit the camera.

use chrono::{DateTime, Utc};
use fleetwatch_shared::models::TelemetryFrame;

use crate::catalog::Fleet;
use crate::map::MapCapability;
use crate::markers::{MarkerReconciler, ReconcileReport};
use crate::selection::SelectionSet;
use crate::store::{LivePositionStore, PositionUpdate};
use crate::viewport::{FitOutcome, ViewportFitter};

/// What one refresh did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub accepted: usize,
    pub rejected: usize,
    /// Frame entries for ids the fleet does not know.
    pub unknown: usize,
    pub statuses_changed: usize,
    pub reconcile: ReconcileReport,
}

pub struct Dashboard<M: MapCapability> {
    fleet: Fleet,
    store: LivePositionStore,
    selection: SelectionSet,
    markers: MarkerReconciler<M::Handle>,
    fitter: ViewportFitter,
    map: M,
}

impl<M: MapCapability> Dashboard<M> {
    pub fn new(fleet: Fleet, map: M) -> Self {
        Dashboard {
            fleet,
            store: LivePositionStore::new(),
            selection: SelectionSet::new(),
            markers: MarkerReconciler::new(),
            fitter: ViewportFitter::new(),
            map,
        }
    }

    pub fn refresh(&mut self, frame: &TelemetryFrame) -> RefreshReport {
        self.refresh_at(frame, Utc::now())
    }

    /// Apply `frame` as observed at `now`, then reconcile markers.
    ///
    /// Ids missing from the fleet are dropped; a fetch that was in flight
    /// while the fleet changed must not resurrect them.
    pub fn refresh_at(&mut self, frame: &TelemetryFrame, now: DateTime<Utc>) -> RefreshReport {
        let mut report = RefreshReport::default();

        for (id, status) in &frame.statuses {
            if !self.fleet.contains(id) {
                tracing::warn!(entity_id = %id, "Status for unknown entity, ignoring");
                report.unknown += 1;
                continue;
            }
            if self.fleet.set_status(id, *status) {
                report.statuses_changed += 1;
            }
        }

        for (id, raw) in &frame.positions {
            if !self.fleet.contains(id) {
                tracing::warn!(entity_id = %id, "Position for unknown entity, ignoring");
                report.unknown += 1;
                continue;
            }
            match self.store.update_at(id, raw, now) {
                PositionUpdate::Accepted => report.accepted += 1,
                PositionUpdate::Rejected(_) => report.rejected += 1,
            }
        }

        report.reconcile = self.reconcile();
        tracing::debug!(
            accepted = report.accepted,
            rejected = report.rejected,
            unknown = report.unknown,
            statuses_changed = report.statuses_changed,
            markers = self.markers.marker_count(),
            "Refresh applied"
        );
        report
    }

    /// Add `id` to the selection. Unknown ids are refused.
    ///
    /// Returns true if the selection changed.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.fleet.contains(id) {
            tracing::warn!(entity_id = id, "Cannot select unknown entity");
            return false;
        }
        if !self.selection.add(id) {
            return false;
        }
        self.selection_changed();
        true
    }

    /// Returns true if the selection changed.
    pub fn deselect(&mut self, id: &str) -> bool {
        if !self.selection.remove(id) {
            return false;
        }
        self.selection_changed();
        true
    }

    /// Flip membership of `id`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.selection.contains(id) {
            self.deselect(id);
            false
        } else {
            self.select(id)
        }
    }

    /// Returns how many ids were deselected.
    pub fn clear_selection(&mut self) -> usize {
        let n = self.selection.clear();
        if n > 0 {
            self.selection_changed();
        }
        n
    }

    /// Bring `id` into view.
    ///
    /// With `id` the only selected entity this centers on it and keeps the
    /// zoom; otherwise the whole selection is fitted. Returns `None` and
    /// leaves the camera alone if `id` is not selected or has no position.
    pub fn focus(&mut self, id: &str) -> Option<FitOutcome> {
        if !self.selection.contains(id) {
            tracing::debug!(entity_id = id, "Focus on unselected entity ignored");
            return None;
        }
        if self.store.get(id).is_none() {
            tracing::debug!(entity_id = id, "Focus on entity without position ignored");
            return None;
        }
        Some(self.fit_viewport())
    }

    pub fn fit_viewport(&mut self) -> FitOutcome {
        self.fitter.fit(&mut self.map, &self.selection, &self.store)
    }

    pub fn reconcile(&mut self) -> ReconcileReport {
        self.markers
            .reconcile(&mut self.map, &self.selection, &self.fleet, &self.store)
    }

    /// Destroy every marker. Selection and positions are kept.
    pub fn teardown(&mut self) -> usize {
        let n = self.markers.clear(&mut self.map);
        tracing::info!(
            markers = n,
            orphans = self.markers.orphan_count(),
            "Dashboard markers torn down"
        );
        n
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn store(&self) -> &LivePositionStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn markers(&self) -> &MarkerReconciler<M::Handle> {
        &self.markers
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    fn selection_changed(&mut self) {
        let report = self.reconcile();
        let fit = self.fit_viewport();
        tracing::debug!(
            selected = self.selection.len(),
            created = report.created,
            destroyed = report.destroyed,
            ?fit,
            "Selection changed"
        );
    }
}
