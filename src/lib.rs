//! Watch-session tracking and classification for streaming-site activity.
//!
//! The pipeline: a [`page::PageObserver`] is polled for page state, the
//! extractor derives a stable video identity from it, the tracker
//! accumulates active watch time across pause/resume and visibility
//! changes, and sessions that cross the minimum watch time are classified
//! (remote provider with a deterministic local fallback) and folded into
//! per-day statistics behind a pluggable [`store::Storage`] backend.
//! [`monitor::Monitor`] wires the whole thing together for one page
//! context.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod extract;
pub mod messaging;
pub mod models;
pub mod monitor;
pub mod page;
pub mod rollover;
pub mod store;
pub mod tracker;

pub use aggregate::{fold_daily_stats, RecordOutcome, Recorder};
pub use classify::{Classification, Classifier};
pub use config::{MonitorConfig, RemoteConfig, TrackerConfig};
pub use messaging::{MessageRouter, Request, Response};
pub use models::{DailyStats, Sentiment, VideoInfo, WatchItem};
pub use monitor::Monitor;
pub use page::{PageObserver, PageState};
pub use store::{MemoryStorage, SqliteStorage, Storage};
pub use tracker::{NudgeEvent, TrackerController, TrackingSession};

/// Initialize logging from `RUST_LOG`, defaulting to info. Safe to call
/// more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
