use std::future::Future;

use fleetwatch_shared::models::TelemetryFrame;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TelemetryError {
    #[error("telemetry fetch failed: {0}")]
    Fetch(String),
}

/// Upstream position feed, polled once per refresh tick.
///
/// A frame may be partial: entities missing from it keep their last position.
pub trait TelemetrySource: Send + Sync + 'static {
    fn fetch_frame(&self) -> impl Future<Output = Result<TelemetryFrame, TelemetryError>> + Send;
}
