//! Live fleet tracking engine.
//!
//! Telemetry flows one way per refresh tick:
//! raw positions -> [`store::LivePositionStore`] -> [`markers::MarkerReconciler`]
//! and [`viewport::ViewportFitter`] -> [`map::MapCapability`] calls.
//! The alarm feed in [`alarms`] runs on its own timer and only talks outward
//! through a broadcast channel.

pub mod alarms;
pub mod catalog;
pub mod dashboard;
pub mod map;
pub mod markers;
pub mod selection;
pub mod store;
pub mod telemetry;
pub mod viewport;

#[cfg(test)]
pub(crate) mod testing;

pub use alarms::{AlarmFeed, AlarmFeedConfig, AlarmLog, AlarmNotification, AlarmSource};
pub use catalog::{EntityCatalog, Fleet};
pub use dashboard::{Dashboard, RefreshReport};
pub use map::{CameraView, MapCapability, MapError, MarkerVisual};
pub use markers::{MarkerReconciler, ReconcileReport};
pub use selection::SelectionSet;
pub use store::{LivePositionStore, PositionUpdate, RejectReason};
pub use telemetry::{TelemetryError, TelemetrySource};
pub use viewport::{FitOutcome, ViewportFitter};
