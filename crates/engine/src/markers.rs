//! Marker lifecycle against the map.
//!
//! The reconciler owns one marker per selected entity that has both a catalog
//! entry and a stored position. Each marker remembers the `(category, status)`
//! it was drawn with; a tick that only moves the entity moves the marker, a
//! tick that changes the signature replaces it.

use std::collections::{BTreeMap, BTreeSet};

use fleetwatch_shared::geo::GeoPoint;
use fleetwatch_shared::models::{EntityId, VisualSignature};

use crate::catalog::EntityCatalog;
use crate::map::{MapCapability, MapError, MarkerVisual};
use crate::selection::SelectionSet;
use crate::store::LivePositionStore;

#[derive(Debug, Clone)]
struct MarkerEntry<H> {
    handle: H,
    signature: VisualSignature,
}

/// What one reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub moved: usize,
    /// Destroyed and created again because the signature changed.
    pub recreated: usize,
    /// Removed because the entity left the eligible set.
    pub destroyed: usize,
    /// Selected but missing an entity or a position.
    pub skipped: usize,
    /// Map calls that failed; the affected id was left for the next tick.
    pub failed: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.recreated == 0 && self.destroyed == 0
    }
}

#[derive(Debug)]
pub struct MarkerReconciler<H> {
    markers: BTreeMap<EntityId, MarkerEntry<H>>,
    /// Unregistered markers the map refused to destroy. Retried every pass.
    orphans: Vec<(EntityId, H)>,
}

impl<H> Default for MarkerReconciler<H> {
    fn default() -> Self {
        MarkerReconciler {
            markers: BTreeMap::new(),
            orphans: Vec::new(),
        }
    }
}

/// Destroy `handle`. A handle the map no longer knows counts as destroyed.
fn destroy<M: MapCapability>(map: &mut M, id: &str, handle: &M::Handle) -> bool {
    match map.destroy_marker(handle) {
        Ok(()) => true,
        Err(MapError::UnknownHandle(_)) => {
            tracing::debug!(entity_id = id, "Marker already gone from the map");
            true
        }
        Err(e) => {
            tracing::warn!(entity_id = id, error = %e, "Failed to destroy marker");
            false
        }
    }
}

impl<H: Clone + std::fmt::Debug> MarkerReconciler<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the live markers in line with `selection`.
    ///
    /// Afterwards the marker set is exactly the selected ids that have an entity
    /// and a position, minus ids whose map calls failed this tick. A marker the
    /// map refused to destroy stays registered and is destroyed again on the
    /// next pass; its replacement is only created once that succeeds. A failure
    /// on one id never stops the others.
    pub fn reconcile<M, C>(
        &mut self,
        map: &mut M,
        selection: &SelectionSet,
        catalog: &C,
        store: &LivePositionStore,
    ) -> ReconcileReport
    where
        M: MapCapability<Handle = H>,
        C: EntityCatalog,
    {
        let mut report = ReconcileReport::default();
        let mut eligible = BTreeSet::new();

        self.orphans.retain(|(id, handle)| !destroy(map, id, handle));

        for id in selection.iter() {
            let (entity, position) = match (catalog.get_entity(id), store.get(id)) {
                (Some(entity), Some(position)) => (entity, position),
                (entity, position) => {
                    tracing::warn!(
                        entity_id = %id,
                        has_entity = entity.is_some(),
                        has_position = position.is_some(),
                        "Selected entity has no marker data, skipping"
                    );
                    report.skipped += 1;
                    continue;
                }
            };
            eligible.insert(id.clone());

            let visual = MarkerVisual::for_entity(entity);
            let point = position.point();

            match self.markers.get(id) {
                None => {
                    if self.place(map, id, point, visual) {
                        report.created += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Some(entry) if entry.signature == visual.signature() => {
                    match map.move_marker(&entry.handle, point) {
                        Ok(()) => report.moved += 1,
                        Err(e) => {
                            tracing::warn!(entity_id = %id, error = %e, "Failed to move marker");
                            report.failed += 1;
                        }
                    }
                }
                Some(entry) => {
                    if !destroy(map, id, &entry.handle) {
                        report.failed += 1;
                        continue;
                    }
                    self.markers.remove(id);
                    if self.place(map, id, point, visual) {
                        report.recreated += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        let stale: Vec<EntityId> = self
            .markers
            .keys()
            .filter(|id| !eligible.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            let Some(entry) = self.markers.get(&id) else {
                continue;
            };
            if destroy(map, &id, &entry.handle) {
                self.markers.remove(&id);
                report.destroyed += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::debug!(
            created = report.created,
            moved = report.moved,
            recreated = report.recreated,
            destroyed = report.destroyed,
            skipped = report.skipped,
            failed = report.failed,
            orphans = self.orphans.len(),
            "Reconciled markers"
        );
        report
    }

    /// Create and register a marker. A marker whose click binding fails is
    /// destroyed again, or kept as an orphan if the map refuses that too.
    fn place<M>(&mut self, map: &mut M, id: &str, point: GeoPoint, visual: MarkerVisual) -> bool
    where
        M: MapCapability<Handle = H>,
    {
        let handle = match map.create_marker(point, &visual) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(entity_id = id, error = %e, "Failed to create marker");
                return false;
            }
        };
        if let Err(e) = map.bind_click(&handle, id) {
            tracing::error!(entity_id = id, error = %e, "Failed to bind marker click");
            if !destroy(map, id, &handle) {
                self.orphans.push((id.to_string(), handle));
            }
            return false;
        }
        self.markers.insert(
            id.to_string(),
            MarkerEntry {
                handle,
                signature: visual.signature(),
            },
        );
        true
    }

    /// Destroy every marker. Returns how many were registered.
    ///
    /// The registry is emptied either way; markers the map refused to destroy
    /// become orphans and are retried by the next `reconcile` or `clear`.
    pub fn clear<M>(&mut self, map: &mut M) -> usize
    where
        M: MapCapability<Handle = H>,
    {
        let n = self.markers.len();
        self.orphans.retain(|(id, handle)| !destroy(map, id, handle));
        for (id, entry) in std::mem::take(&mut self.markers) {
            if !destroy(map, &id, &entry.handle) {
                self.orphans.push((id, entry.handle));
            }
        }
        n
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn has_marker(&self, id: &str) -> bool {
        self.markers.contains_key(id)
    }

    pub fn handle(&self, id: &str) -> Option<&H> {
        self.markers.get(id).map(|entry| &entry.handle)
    }

    pub fn marker_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.markers.keys()
    }

    /// Markers still on the map that no longer belong to any entity.
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Fleet;
    use crate::testing::{entity, RecordingMap};
    use fleetwatch_shared::models::{EntityStatus, RawPosition};

    struct Fixture {
        map: RecordingMap,
        fleet: Fleet,
        store: LivePositionStore,
        selection: SelectionSet,
        reconciler: MarkerReconciler<u64>,
    }

    impl Fixture {
        fn new() -> Self {
            let fleet = Fleet::new(vec![
                entity("001", "truck", EntityStatus::Active),
                entity("002", "bus", EntityStatus::Idle),
                entity("003", "truck", EntityStatus::Offline),
                entity("004", "bus", EntityStatus::Active),
            ]);
            let mut store = LivePositionStore::new();
            store.update("001", &RawPosition::at(116.40, 39.90));
            store.update("002", &RawPosition::at(116.41, 39.91));
            store.update("003", &RawPosition::at(116.39, 39.89));
            // 004 has no position
            Fixture {
                map: RecordingMap::new(),
                fleet,
                store,
                selection: SelectionSet::new(),
                reconciler: MarkerReconciler::new(),
            }
        }

        fn reconcile(&mut self) -> ReconcileReport {
            self.reconciler
                .reconcile(&mut self.map, &self.selection, &self.fleet, &self.store)
        }

        /// Selected ids with both an entity and a position.
        fn eligible(&self) -> BTreeSet<EntityId> {
            self.selection
                .iter()
                .filter(|id| self.fleet.get(id).is_some() && self.store.get(id).is_some())
                .cloned()
                .collect()
        }
    }

    #[test]
    fn test_creates_markers_for_selection() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.selection.add("002");

        let report = fx.reconcile();
        assert_eq!(report.created, 2);
        assert_eq!(fx.map.creates, 2);
        assert_eq!(fx.map.binds, 2);
        assert_eq!(fx.reconciler.marker_count(), 2);
        assert!(fx.map.marker_for("001").unwrap().clickable);
    }

    #[test]
    fn test_skips_entities_without_position_or_catalog_entry() {
        let mut fx = Fixture::new();
        fx.selection.add("004");
        fx.selection.add("999");

        let report = fx.reconcile();
        assert_eq!(report.skipped, 2);
        assert_eq!(fx.map.creates, 0);
        assert_eq!(fx.reconciler.marker_count(), 0);
    }

    #[test]
    fn test_second_reconcile_is_churn_free() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.selection.add("003");
        fx.reconcile();
        fx.map.reset_counters();

        let report = fx.reconcile();
        assert!(report.is_noop());
        assert_eq!(fx.map.creates, 0);
        assert_eq!(fx.map.destroys, 0);
    }

    #[test]
    fn test_pure_movement_moves_in_place() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.reconcile();
        let handle = *fx.reconciler.handle("001").unwrap();
        fx.map.reset_counters();

        fx.store.update("001", &RawPosition::at(116.45, 39.95));
        let report = fx.reconcile();

        assert_eq!(report.moved, 1);
        assert_eq!(fx.map.moves, 1);
        assert_eq!(fx.map.creates, 0);
        assert_eq!(fx.map.destroys, 0);
        assert_eq!(*fx.reconciler.handle("001").unwrap(), handle);
        let live = fx.map.marker_for("001").unwrap();
        assert_eq!(live.position, GeoPoint::new(116.45, 39.95));
    }

    #[test]
    fn test_status_change_recreates_once() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.reconcile();
        let old_handle = *fx.reconciler.handle("001").unwrap();
        fx.map.reset_counters();

        fx.fleet.set_status("001", EntityStatus::Idle);
        let report = fx.reconcile();

        assert_eq!(report.recreated, 1);
        assert_eq!(fx.map.destroys, 1);
        assert_eq!(fx.map.creates, 1);
        assert_eq!(fx.map.binds, 1);
        assert_eq!(fx.map.moves, 0);
        assert_ne!(*fx.reconciler.handle("001").unwrap(), old_handle);
        assert_eq!(
            fx.map.marker_for("001").unwrap().visual.status,
            EntityStatus::Idle
        );
    }

    #[test]
    fn test_deselect_destroys_marker() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.selection.add("002");
        fx.reconcile();
        fx.map.reset_counters();

        fx.selection.remove("002");
        let report = fx.reconcile();
        assert_eq!(report.destroyed, 1);
        assert_eq!(fx.map.destroys, 1);
        assert!(!fx.reconciler.has_marker("002"));
        assert!(fx.map.marker_for("002").is_none());
    }

    #[test]
    fn test_marker_set_tracks_any_selection_sequence() {
        let mut fx = Fixture::new();
        let ops: [(&str, bool); 10] = [
            ("001", true),
            ("004", true),
            ("002", true),
            ("001", false),
            ("003", true),
            ("999", true),
            ("002", false),
            ("001", true),
            ("003", false),
            ("002", true),
        ];
        for (id, add) in ops {
            if add {
                fx.selection.add(id);
            } else {
                fx.selection.remove(id);
            }
            fx.reconcile();
            let expected = fx.eligible();
            assert_eq!(fx.map.live_entity_ids(), expected);
            let registered: BTreeSet<EntityId> = fx.reconciler.marker_ids().cloned().collect();
            assert_eq!(registered, expected);
        }
    }

    #[test]
    fn test_create_failure_does_not_stop_others() {
        let mut fx = Fixture::new();
        fx.map.fail_create_for.insert("002".to_string());
        fx.selection.add("001");
        fx.selection.add("002");
        fx.selection.add("003");

        let report = fx.reconcile();
        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 1);
        assert!(fx.reconciler.has_marker("001"));
        assert!(!fx.reconciler.has_marker("002"));
        assert!(fx.reconciler.has_marker("003"));

        // Retried on the next tick once the map recovers
        fx.map.fail_create_for.clear();
        let report = fx.reconcile();
        assert_eq!(report.created, 1);
        assert!(fx.reconciler.has_marker("002"));
    }

    #[test]
    fn test_move_failure_keeps_marker() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.selection.add("002");
        fx.reconcile();
        fx.map.fail_move_for.insert("001".to_string());

        fx.store.update("001", &RawPosition::at(116.5, 39.5));
        fx.store.update("002", &RawPosition::at(116.6, 39.6));
        let report = fx.reconcile();
        assert_eq!(report.failed, 1);
        assert_eq!(report.moved, 1);
        assert!(fx.reconciler.has_marker("001"));
        assert_eq!(
            fx.map.marker_for("002").unwrap().position,
            GeoPoint::new(116.6, 39.6)
        );
    }

    #[test]
    fn test_bind_failure_leaves_nothing_behind() {
        let mut fx = Fixture::new();
        fx.map.fail_bind = true;
        fx.selection.add("001");

        let report = fx.reconcile();
        assert_eq!(report.failed, 1);
        assert_eq!(fx.reconciler.marker_count(), 0);
        assert!(fx.map.markers.is_empty());
    }

    /// Entity id and drawn status of every marker on the map, oldest first.
    fn live(map: &RecordingMap) -> Vec<(EntityId, EntityStatus)> {
        map.markers
            .values()
            .map(|m| (m.visual.entity_id.clone(), m.visual.status))
            .collect()
    }

    #[test]
    fn test_refused_destroy_is_retried_until_map_matches() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.selection.add("002");
        fx.reconcile();

        fx.map.fail_destroy = true;
        fx.fleet.set_status("001", EntityStatus::Idle);
        fx.selection.remove("002");
        let report = fx.reconcile();
        assert_eq!(report.failed, 2);
        assert_eq!(report.recreated, 0);
        assert_eq!(report.destroyed, 0);
        // No replacement while the old marker is still up
        assert_eq!(fx.map.creates, 2);
        assert!(fx.reconciler.has_marker("002"));

        fx.map.fail_destroy = false;
        for _ in 0..3 {
            fx.reconcile();
        }
        assert_eq!(live(&fx.map), vec![("001".to_string(), EntityStatus::Idle)]);
        let registered: Vec<EntityId> = fx.reconciler.marker_ids().cloned().collect();
        assert_eq!(registered, vec!["001".to_string()]);
    }

    #[test]
    fn test_refused_destroy_on_status_change_keeps_old_marker() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.reconcile();
        let old_handle = *fx.reconciler.handle("001").unwrap();
        fx.map.fail_destroy = true;

        fx.fleet.set_status("001", EntityStatus::Offline);
        fx.reconcile();
        fx.reconcile();
        assert_eq!(*fx.reconciler.handle("001").unwrap(), old_handle);
        assert_eq!(live(&fx.map), vec![("001".to_string(), EntityStatus::Active)]);

        fx.map.fail_destroy = false;
        let report = fx.reconcile();
        assert_eq!(report.recreated, 1);
        assert_eq!(live(&fx.map), vec![("001".to_string(), EntityStatus::Offline)]);
    }

    #[test]
    fn test_refused_destroy_after_deselect_is_retried() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.selection.add("003");
        fx.reconcile();
        fx.map.fail_destroy = true;

        fx.selection.remove("003");
        let report = fx.reconcile();
        assert_eq!(report.failed, 1);
        assert!(fx.map.marker_for("003").is_some());

        fx.map.fail_destroy = false;
        let report = fx.reconcile();
        assert_eq!(report.destroyed, 1);
        assert_eq!(fx.map.live_entity_ids(), fx.eligible());
        assert!(!fx.reconciler.has_marker("003"));
    }

    #[test]
    fn test_unbound_marker_that_cannot_be_destroyed_is_retried() {
        let mut fx = Fixture::new();
        fx.map.fail_bind = true;
        fx.map.fail_destroy = true;
        fx.selection.add("001");

        let report = fx.reconcile();
        assert_eq!(report.failed, 1);
        assert_eq!(fx.reconciler.marker_count(), 0);
        assert_eq!(fx.reconciler.orphan_count(), 1);

        fx.map.fail_bind = false;
        fx.map.fail_destroy = false;
        fx.reconcile();
        assert_eq!(fx.reconciler.orphan_count(), 0);
        assert_eq!(fx.map.markers.len(), 1);
        assert!(fx.map.marker_for("001").unwrap().clickable);
    }

    #[test]
    fn test_marker_removed_behind_our_back_counts_as_destroyed() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.reconcile();
        fx.map.markers.clear();

        fx.selection.remove("001");
        let report = fx.reconcile();
        assert_eq!(report.destroyed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(fx.reconciler.marker_count(), 0);
    }

    #[test]
    fn test_clear_keeps_refused_markers_as_orphans() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.selection.add("002");
        fx.reconcile();
        fx.map.fail_destroy = true;

        assert_eq!(fx.reconciler.clear(&mut fx.map), 2);
        assert_eq!(fx.reconciler.marker_count(), 0);
        assert_eq!(fx.reconciler.orphan_count(), 2);

        fx.map.fail_destroy = false;
        assert_eq!(fx.reconciler.clear(&mut fx.map), 0);
        assert_eq!(fx.reconciler.orphan_count(), 0);
        assert!(fx.map.markers.is_empty());
    }

    #[test]
    fn test_clear_destroys_everything() {
        let mut fx = Fixture::new();
        fx.selection.add("001");
        fx.selection.add("002");
        fx.reconcile();

        assert_eq!(fx.reconciler.clear(&mut fx.map), 2);
        assert_eq!(fx.reconciler.marker_count(), 0);
        assert!(fx.map.markers.is_empty());
    }
}
