use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::warn;
use serde_json::Value;

use crate::models::{DailyStats, WatchItem};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub const KEY_VIDEOS: &str = "videos";
pub const KEY_TODAY_STATS: &str = "todayStats";
pub const KEY_IS_TRACKING: &str = "isTracking";
pub const KEY_API_TOKEN: &str = "apiToken";

/// Archived day aggregates live under `stats-<ISO date>`.
pub const ARCHIVE_KEY_PREFIX: &str = "stats-";

pub fn archive_key(day: NaiveDate) -> String {
    format!("{ARCHIVE_KEY_PREFIX}{}", day.format("%Y-%m-%d"))
}

/// Key-value persistence collaborator.
///
/// A whole `set` mapping is applied atomically, but a read-then-set sequence
/// across two calls is not isolated. Callers that read-modify-write (the
/// recorder, the rollover) accept last-write-wins on the raw keys and keep
/// derived values re-derivable so interleaved writers cannot corrupt them.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;
    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Stored item list, tolerating a missing or unreadable key.
pub async fn load_videos(storage: &dyn Storage) -> Result<Vec<WatchItem>> {
    let mut found = storage.get(&[KEY_VIDEOS]).await?;
    let Some(raw) = found.remove(KEY_VIDEOS) else {
        return Ok(Vec::new());
    };
    match serde_json::from_value(raw) {
        Ok(videos) => Ok(videos),
        Err(err) => {
            warn!("stored video list is unreadable, starting empty: {err}");
            Ok(Vec::new())
        }
    }
}

/// Cached daily aggregate. Unreadable or partial values collapse to zero;
/// callers that need trustworthy numbers recompute from the item list.
pub async fn load_today_stats(storage: &dyn Storage) -> Result<DailyStats> {
    let mut found = storage.get(&[KEY_TODAY_STATS]).await?;
    let Some(raw) = found.remove(KEY_TODAY_STATS) else {
        return Ok(DailyStats::zero());
    };
    Ok(serde_json::from_value(raw).unwrap_or_else(|err| {
        warn!("stored stats are unreadable, resetting: {err}");
        DailyStats::zero()
    }))
}

/// Tracking-enabled flag; anything other than an explicit `false` is on.
pub async fn load_is_tracking(storage: &dyn Storage) -> Result<bool> {
    let mut found = storage.get(&[KEY_IS_TRACKING]).await?;
    Ok(found
        .remove(KEY_IS_TRACKING)
        .and_then(|raw| raw.as_bool())
        .unwrap_or(true))
}

pub async fn load_api_token(storage: &dyn Storage) -> Result<Option<String>> {
    let mut found = storage.get(&[KEY_API_TOKEN]).await?;
    Ok(found
        .remove(KEY_API_TOKEN)
        .and_then(|raw| raw.as_str().map(str::to_string))
        .filter(|token| !token.is_empty()))
}

pub fn default_entries() -> HashMap<String, Value> {
    HashMap::from([
        (KEY_IS_TRACKING.to_string(), Value::Bool(true)),
        (KEY_VIDEOS.to_string(), Value::Array(Vec::new())),
        (
            KEY_TODAY_STATS.to_string(),
            serde_json::to_value(DailyStats::zero()).unwrap_or_default(),
        ),
    ])
}

/// First-run seeding. Existing keys are left alone so a restart never
/// resets live data.
pub async fn seed_defaults_if_missing(storage: &dyn Storage) -> Result<()> {
    let present = storage
        .get(&[KEY_VIDEOS, KEY_TODAY_STATS, KEY_IS_TRACKING])
        .await?;

    let missing: HashMap<String, Value> = default_entries()
        .into_iter()
        .filter(|(key, _)| !present.contains_key(key))
        .collect();

    if !missing.is_empty() {
        storage.set(missing).await?;
    }
    Ok(())
}
