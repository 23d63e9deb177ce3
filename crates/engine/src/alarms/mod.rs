//! Alarm feed: a polled, capped, read-tracked alarm log.
//!
//! - [`AlarmLog`] - newest-first buffer with unique ids and a size cap
//! - [`AlarmSource`] - the upstream the feed polls
//! - [`AlarmFeed`] - idle/polling controller that fetches on a fixed interval
//!   and broadcasts each new batch as an [`AlarmNotification`]

mod feed;
mod log;
mod source;

pub use feed::{AlarmFeed, AlarmFeedConfig, AlarmNotification, FeedState, DEFAULT_POLL_INTERVAL};
pub use log::{AlarmLog, AlarmStats, DEFAULT_CAPACITY};
pub use source::{AlarmSource, AlarmSourceError};
