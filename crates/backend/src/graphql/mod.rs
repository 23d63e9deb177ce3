use std::sync::Arc;

use async_graphql::{Context, Enum, InputObject, Object, SimpleObject};
use fleetwatch_engine::viewport::FitOutcome;
use fleetwatch_engine::{AlarmFeed, Dashboard};
use fleetwatch_shared::{
    filter::{self, FleetFilter},
    geo,
    models::{self, EntityStatus, Severity},
};

use crate::map::HeadlessMap;
use crate::refresh::SharedDashboard;
use crate::sim::SimulatedAlarms;

pub type SharedAlarms = Arc<AlarmFeed<SimulatedAlarms>>;

/// Digits after the decimal point in formatted coordinates.
const COORD_PRECISION: usize = 6;

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlVehicleStatus {
    Offline,
    Active,
    Idle,
}

impl From<EntityStatus> for GqlVehicleStatus {
    fn from(s: EntityStatus) -> Self {
        match s {
            EntityStatus::Offline => GqlVehicleStatus::Offline,
            EntityStatus::Active => GqlVehicleStatus::Active,
            EntityStatus::Idle => GqlVehicleStatus::Idle,
        }
    }
}

impl From<GqlVehicleStatus> for EntityStatus {
    fn from(s: GqlVehicleStatus) -> Self {
        match s {
            GqlVehicleStatus::Offline => EntityStatus::Offline,
            GqlVehicleStatus::Active => EntityStatus::Active,
            GqlVehicleStatus::Idle => EntityStatus::Idle,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlSeverity {
    Low,
    Medium,
    High,
}

impl From<Severity> for GqlSeverity {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Low => GqlSeverity::Low,
            Severity::Medium => GqlSeverity::Medium,
            Severity::High => GqlSeverity::High,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlFitKind {
    Skipped,
    Centered,
    Fitted,
    Fallback,
}

// GraphQL output types

#[derive(SimpleObject)]
pub struct GqlPosition {
    pub lng: f64,
    pub lat: f64,
    pub altitude: Option<f64>,
    pub speed_kph: f64,
    pub heading_deg: f64,
    pub observed_at: String,
    pub formatted: String,
}

impl From<&models::Position> for GqlPosition {
    fn from(p: &models::Position) -> Self {
        GqlPosition {
            lng: p.lng,
            lat: p.lat,
            altitude: p.altitude,
            speed_kph: p.speed_kph,
            heading_deg: p.heading_deg,
            observed_at: p.observed_at.to_rfc3339(),
            formatted: geo::format_coordinates(p.lng, p.lat, COORD_PRECISION),
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlVehicle {
    pub id: String,
    pub display_label: String,
    pub category: String,
    pub status: GqlVehicleStatus,
    pub status_label: String,
    pub plate_color: String,
    pub selected: bool,
    pub has_marker: bool,
    pub position: Option<GqlPosition>,
}

#[derive(SimpleObject)]
pub struct GqlMarker {
    pub entity_id: String,
    pub label: String,
    pub category: String,
    pub status: GqlVehicleStatus,
    pub plate_color: String,
    pub lng: f64,
    pub lat: f64,
    pub clickable: bool,
}

#[derive(SimpleObject)]
pub struct GqlMapView {
    pub center_lng: f64,
    pub center_lat: f64,
    pub zoom: f64,
    pub markers: Vec<GqlMarker>,
}

#[derive(SimpleObject)]
pub struct GqlFitOutcome {
    pub kind: GqlFitKind,
    pub center_lng: Option<f64>,
    pub center_lat: Option<f64>,
    pub zoom: Option<f64>,
}

impl From<FitOutcome> for GqlFitOutcome {
    fn from(outcome: FitOutcome) -> Self {
        match outcome {
            FitOutcome::Skipped => GqlFitOutcome {
                kind: GqlFitKind::Skipped,
                center_lng: None,
                center_lat: None,
                zoom: None,
            },
            FitOutcome::Centered(center) => GqlFitOutcome {
                kind: GqlFitKind::Centered,
                center_lng: Some(center.lng),
                center_lat: Some(center.lat),
                zoom: None,
            },
            FitOutcome::Fitted(view) => GqlFitOutcome {
                kind: GqlFitKind::Fitted,
                center_lng: Some(view.center.lng),
                center_lat: Some(view.center.lat),
                zoom: Some(view.zoom),
            },
            FitOutcome::Fallback { center, zoom, .. } => GqlFitOutcome {
                kind: GqlFitKind::Fallback,
                center_lng: Some(center.lng),
                center_lat: Some(center.lat),
                zoom: Some(f64::from(zoom)),
            },
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlAlarm {
    pub id: String,
    pub entity_id: String,
    pub kind: String,
    pub severity: GqlSeverity,
    pub raised_at: String,
    pub is_read: bool,
}

impl From<models::Alarm> for GqlAlarm {
    fn from(a: models::Alarm) -> Self {
        GqlAlarm {
            id: a.id,
            entity_id: a.entity_id,
            kind: a.kind,
            severity: a.severity.into(),
            raised_at: a.raised_at.to_rfc3339(),
            is_read: a.is_read,
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlAlarmStats {
    pub total: u64,
    pub unread: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

// Input types

#[derive(InputObject, Default)]
pub struct VehicleFilterInput {
    pub label: Option<String>,
    pub category: Option<String>,
    pub status: Option<GqlVehicleStatus>,
}

impl From<VehicleFilterInput> for FleetFilter {
    fn from(f: VehicleFilterInput) -> Self {
        FleetFilter {
            label: f.label,
            category: f.category,
            status: f.status.map(Into::into),
        }
    }
}

fn vehicle_view(dash: &Dashboard<HeadlessMap>, entity: &models::Entity) -> GqlVehicle {
    GqlVehicle {
        id: entity.id.clone(),
        display_label: entity.display_label.clone(),
        category: entity.category.clone(),
        status: entity.status.into(),
        status_label: entity.status.label().to_string(),
        plate_color: entity.status.plate_color().to_string(),
        selected: dash.selection().contains(&entity.id),
        has_marker: dash.markers().has_marker(&entity.id),
        position: dash.store().get(&entity.id).map(GqlPosition::from),
    }
}

fn unknown_vehicle(id: &str) -> async_graphql::Error {
    async_graphql::Error::new(format!("Unknown vehicle: {}", id))
}

// Query root

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn vehicles(
        &self,
        ctx: &Context<'_>,
        filter: Option<VehicleFilterInput>,
    ) -> async_graphql::Result<Vec<GqlVehicle>> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        let filter: FleetFilter = filter.unwrap_or_default().into();
        let dash = dashboard.lock();
        Ok(dash
            .fleet()
            .filter(&filter)
            .into_iter()
            .map(|e| vehicle_view(&dash, e))
            .collect())
    }

    async fn vehicle(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<Option<GqlVehicle>> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        let dash = dashboard.lock();
        Ok(dash.fleet().get(&id).map(|e| vehicle_view(&dash, e)))
    }

    async fn categories(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<String>> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        let dash = dashboard.lock();
        Ok(filter::category_options(dash.fleet().iter()))
    }

    async fn selection(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<String>> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        Ok(dashboard.lock().selection().all())
    }

    async fn map_view(&self, ctx: &Context<'_>) -> async_graphql::Result<GqlMapView> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        let dash = dashboard.lock();
        let map = dash.map();
        let camera = map.camera();
        Ok(GqlMapView {
            center_lng: camera.center.lng,
            center_lat: camera.center.lat,
            zoom: camera.zoom,
            markers: map
                .markers()
                .map(|(_, m)| GqlMarker {
                    entity_id: m.visual.entity_id.clone(),
                    label: m.visual.label.clone(),
                    category: m.visual.category.clone(),
                    status: m.visual.status.into(),
                    plate_color: m.visual.plate_color().to_string(),
                    lng: m.position.lng,
                    lat: m.position.lat,
                    clickable: m.click_target.is_some(),
                })
                .collect(),
        })
    }

    /// Great-circle distance in meters, or null if either vehicle has no position yet.
    async fn distance(
        &self,
        ctx: &Context<'_>,
        from_id: String,
        to_id: String,
    ) -> async_graphql::Result<Option<f64>> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        let dash = dashboard.lock();
        for id in [&from_id, &to_id] {
            if !dash.fleet().contains(id) {
                return Err(unknown_vehicle(id));
            }
        }
        let store = dash.store();
        Ok(match (store.get(&from_id), store.get(&to_id)) {
            (Some(a), Some(b)) => Some(geo::distance_meters(a.point(), b.point())),
            _ => None,
        })
    }

    async fn alarms(
        &self,
        ctx: &Context<'_>,
        unread_only: Option<bool>,
    ) -> async_graphql::Result<Vec<GqlAlarm>> {
        let alarms = ctx.data::<SharedAlarms>()?;
        let list = if unread_only.unwrap_or(false) {
            alarms.unread()
        } else {
            alarms.alarms()
        };
        Ok(list.into_iter().map(GqlAlarm::from).collect())
    }

    async fn alarm_stats(&self, ctx: &Context<'_>) -> async_graphql::Result<GqlAlarmStats> {
        let stats = ctx.data::<SharedAlarms>()?.stats();
        Ok(GqlAlarmStats {
            total: stats.total as u64,
            unread: stats.unread as u64,
            high: stats.high as u64,
            medium: stats.medium as u64,
            low: stats.low as u64,
        })
    }

    async fn alarm_polling(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        Ok(ctx.data::<SharedAlarms>()?.is_polling())
    }
}

// Mutation root

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Returns the selection afterwards.
    async fn select_vehicle(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<Vec<String>> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        let mut dash = dashboard.lock();
        if !dash.fleet().contains(&id) {
            return Err(unknown_vehicle(&id));
        }
        dash.select(&id);
        Ok(dash.selection().all())
    }

    async fn deselect_vehicle(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<Vec<String>> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        let mut dash = dashboard.lock();
        dash.deselect(&id);
        Ok(dash.selection().all())
    }

    /// Returns whether the vehicle is selected afterwards.
    async fn toggle_vehicle(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<bool> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        let mut dash = dashboard.lock();
        if !dash.fleet().contains(&id) {
            return Err(unknown_vehicle(&id));
        }
        Ok(dash.toggle(&id))
    }

    async fn clear_selection(&self, ctx: &Context<'_>) -> async_graphql::Result<u64> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        Ok(dashboard.lock().clear_selection() as u64)
    }

    async fn focus_vehicle(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<GqlFitOutcome> {
        let dashboard = ctx.data::<SharedDashboard>()?;
        dashboard
            .lock()
            .focus(&id)
            .map(GqlFitOutcome::from)
            .ok_or_else(|| async_graphql::Error::new(format!("Vehicle is not selected or has no position: {}", id)))
    }

    async fn mark_alarm_read(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<bool> {
        Ok(ctx.data::<SharedAlarms>()?.mark_read(&id))
    }

    async fn mark_all_alarms_read(&self, ctx: &Context<'_>) -> async_graphql::Result<u64> {
        Ok(ctx.data::<SharedAlarms>()?.mark_all_read() as u64)
    }

    async fn remove_alarm(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<bool> {
        Ok(ctx.data::<SharedAlarms>()?.remove(&id).is_some())
    }

    async fn clear_alarms(&self, ctx: &Context<'_>) -> async_graphql::Result<u64> {
        Ok(ctx.data::<SharedAlarms>()?.clear() as u64)
    }

    /// Returns false if polling was already running.
    async fn start_alarm_polling(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        Ok(ctx.data::<SharedAlarms>()?.start())
    }

    /// Returns false if polling was already stopped.
    async fn stop_alarm_polling(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        Ok(ctx.data::<SharedAlarms>()?.stop())
    }
}

pub type Schema = async_graphql::Schema<QueryRoot, MutationRoot, async_graphql::EmptySubscription>;

pub fn build_schema(dashboard: SharedDashboard, alarms: SharedAlarms) -> Schema {
    async_graphql::Schema::build(QueryRoot, MutationRoot, async_graphql::EmptySubscription)
        .data(dashboard)
        .data(alarms)
        .finish()
}
