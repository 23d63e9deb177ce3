//! Background tasks: the position refresh tick and the alarm listener.

use std::sync::Arc;
use std::time::Duration;

use fleetwatch_engine::alarms::AlarmNotification;
use fleetwatch_engine::telemetry::TelemetrySource;
use fleetwatch_engine::Dashboard;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::map::HeadlessMap;

pub type SharedDashboard = Arc<Mutex<Dashboard<HeadlessMap>>>;

/// Fetch a frame every `period` and apply it to the dashboard.
///
/// The first fetch happens immediately. A failed fetch skips that tick.
pub fn spawn_refresh_loop<T: TelemetrySource>(
    dashboard: SharedDashboard,
    source: T,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_ms = period.as_millis() as u64, "Position refresh started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                fetched = source.fetch_frame() => fetched,
            };
            match fetched {
                Ok(frame) => {
                    let report = dashboard.lock().refresh(&frame);
                    if report.rejected > 0 || report.unknown > 0 {
                        tracing::debug!(
                            rejected = report.rejected,
                            unknown = report.unknown,
                            "Refresh dropped some updates"
                        );
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Telemetry fetch failed"),
            }
        }

        tracing::info!("Position refresh stopped");
    })
}

/// Log every alarm batch as it arrives.
pub fn spawn_alarm_listener(
    mut rx: broadcast::Receiver<AlarmNotification>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = rx.recv() => received,
            };
            match received {
                Ok(note) => {
                    for alarm in &note.new_alarms {
                        tracing::info!(
                            alarm_id = %alarm.id,
                            entity_id = %alarm.entity_id,
                            kind = %alarm.kind,
                            severity = %alarm.severity,
                            "New alarm"
                        );
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Alarm listener fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
