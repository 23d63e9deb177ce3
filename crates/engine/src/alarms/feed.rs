//! Alarm feed controller - poll loop around an [`AlarmLog`].
//!
//! `start()` spawns a task that fetches immediately and then on every
//! `poll_interval` tick. `stop()` cancels it before returning. Fetch failures
//! are logged and the next tick proceeds as usual.
//!
//! New batches go out on a broadcast channel; the feed does not know or care
//! who is listening.
//!
//! ```ignore
//! let feed = AlarmFeed::new(source);
//! let mut rx = feed.subscribe();
//! feed.start();
//! while let Ok(note) = rx.recv().await {
//!     show_popup(&note.new_alarms);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use fleetwatch_shared::models::Alarm;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::log::{AlarmLog, AlarmStats, DEFAULT_CAPACITY};
use super::source::AlarmSource;

/// Time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Notifications a slow subscriber may lag behind before it starts missing batches.
const NOTIFICATION_CHANNEL_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct AlarmFeedConfig {
    pub poll_interval: Duration,
    /// Maximum alarms kept in the log.
    pub capacity: usize,
}

impl Default for AlarmFeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// One poll's worth of new alarms, newest first. Never the whole log.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmNotification {
    pub new_alarms: Vec<Alarm>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Polling,
}

struct Shared<S> {
    source: S,
    log: Mutex<AlarmLog>,
    notify_tx: broadcast::Sender<AlarmNotification>,
}

impl<S: AlarmSource> Shared<S> {
    /// Fetch once and fold the result into the log. Returns the number of new alarms.
    async fn poll(&self) -> usize {
        let batch = match self.source.fetch_new_alarms().await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch alarms");
                return 0;
            }
        };
        if batch.is_empty() {
            tracing::trace!("No new alarms");
            return 0;
        }

        let fresh = self.log.lock().ingest(batch);
        if fresh.is_empty() {
            tracing::debug!("Alarm batch contained only known ids");
            return 0;
        }

        let count = fresh.len();
        tracing::debug!(count, "Received new alarms");
        // No subscribers is fine
        let _ = self.notify_tx.send(AlarmNotification { new_alarms: fresh });
        count
    }
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Idle/polling controller for the alarm log.
///
/// All methods take `&self`, so one feed can be shared behind an `Arc`.
pub struct AlarmFeed<S: AlarmSource> {
    shared: Arc<Shared<S>>,
    task: Mutex<Option<PollTask>>,
    poll_interval: Duration,
}

impl<S: AlarmSource> AlarmFeed<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, AlarmFeedConfig::default())
    }

    pub fn with_config(source: S, config: AlarmFeedConfig) -> Self {
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        Self {
            shared: Arc::new(Shared {
                source,
                log: Mutex::new(AlarmLog::with_capacity(config.capacity)),
                notify_tx,
            }),
            task: Mutex::new(None),
            poll_interval: config.poll_interval,
        }
    }

    /// Begin polling. Must be called inside a tokio runtime.
    ///
    /// Returns false if the feed was already polling.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() {
            tracing::debug!("Alarm feed already polling");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_poll_loop(
            Arc::clone(&self.shared),
            self.poll_interval,
            cancel.clone(),
        ));
        *task = Some(PollTask { cancel, handle });

        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Alarm feed started"
        );
        true
    }

    /// Stop polling. No fetch is started once this returns.
    ///
    /// Returns false if the feed was already idle.
    pub fn stop(&self) -> bool {
        let Some(task) = self.task.lock().take() else {
            tracing::debug!("Alarm feed already idle");
            return false;
        };
        task.cancel.cancel();
        task.handle.abort();
        tracing::info!("Alarm feed stopped");
        true
    }

    pub fn state(&self) -> FeedState {
        if self.task.lock().is_some() {
            FeedState::Polling
        } else {
            FeedState::Idle
        }
    }

    pub fn is_polling(&self) -> bool {
        self.state() == FeedState::Polling
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlarmNotification> {
        self.shared.notify_tx.subscribe()
    }

    /// Run a single poll now, outside the timer.
    pub async fn poll_once(&self) -> usize {
        self.shared.poll().await
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        self.shared.log.lock().snapshot()
    }

    pub fn unread(&self) -> Vec<Alarm> {
        self.shared.log.lock().unread()
    }

    pub fn stats(&self) -> AlarmStats {
        self.shared.log.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.shared.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.log.lock().is_empty()
    }

    pub fn mark_read(&self, id: &str) -> bool {
        self.shared.log.lock().mark_read(id)
    }

    pub fn mark_all_read(&self) -> usize {
        self.shared.log.lock().mark_all_read()
    }

    pub fn remove(&self, id: &str) -> Option<Alarm> {
        self.shared.log.lock().remove(id)
    }

    pub fn clear(&self) -> usize {
        self.shared.log.lock().clear()
    }
}

impl<S: AlarmSource> Drop for AlarmFeed<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}

async fn run_poll_loop<S: AlarmSource>(
    shared: Arc<Shared<S>>,
    period: Duration,
    cancel: CancellationToken,
) {
    // First tick completes immediately.
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = shared.poll() => {}
        }
    }

    tracing::debug!("Alarm poll loop exited");
}
