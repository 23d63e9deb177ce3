use std::future::Future;

use fleetwatch_shared::models::Alarm;
use thiserror::Error;

/// Errors an alarm source can report. None of them stop the poll loop.
#[derive(Debug, Clone, Error)]
pub enum AlarmSourceError {
    /// The upstream request failed.
    #[error("alarm fetch failed: {0}")]
    Fetch(String),
}

/// Upstream that hands out alarms raised since the previous call.
pub trait AlarmSource: Send + Sync + 'static {
    /// New alarms, possibly none.
    fn fetch_new_alarms(&self) -> impl Future<Output = Result<Vec<Alarm>, AlarmSourceError>> + Send;
}
