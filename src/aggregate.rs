use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use log::info;
use serde_json::Value;

use crate::models::{DailyStats, Sentiment, WatchItem};
use crate::store::{self, Storage, KEY_TODAY_STATS, KEY_VIDEOS};

/// Result of submitting a finalized watch event.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Stored {
        /// Today's negative count just landed on a positive multiple of
        /// three; the UI collaborator may want to nudge.
        nudge: bool,
        stats: DailyStats,
    },
    Duplicate,
}

/// Appends finalized watch events to the store and keeps the daily
/// aggregate in sync.
///
/// `record` is a read-modify-write over the shared store. The store only
/// guarantees atomicity per `set` call, so two contexts racing here can
/// lose an append (last write wins). That is accepted: the duplicate guard
/// makes re-submission safe and the daily aggregate is recomputed from the
/// item list on every write, so it can never drift from what a fresh fold
/// would produce.
pub struct Recorder {
    storage: Arc<dyn Storage>,
}

impl Recorder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn record(&self, item: WatchItem) -> Result<RecordOutcome> {
        let mut videos = store::load_videos(&*self.storage).await?;

        if videos.iter().any(|existing| existing.id == item.id) {
            return Ok(RecordOutcome::Duplicate);
        }

        info!("Recording watch item '{}' ({})", item.title, item.id);
        videos.push(item);

        let stats = fold_daily_stats(&videos, today_local());
        let nudge = stats.negative > 0 && stats.negative % 3 == 0;

        let entries = HashMap::from([
            (KEY_VIDEOS.to_string(), serde_json::to_value(&videos)?),
            (KEY_TODAY_STATS.to_string(), serde_json::to_value(&stats)?),
        ]);
        self.storage.set(entries).await?;

        Ok(RecordOutcome::Stored { nudge, stats })
    }
}

pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// Recompute the aggregate for `day` from scratch. Items with an
/// unrepresentable timestamp are skipped rather than miscounted.
pub fn fold_daily_stats(items: &[WatchItem], day: NaiveDate) -> DailyStats {
    let mut stats = DailyStats::zero();
    for item in items {
        let Some(date) = item.local_date() else {
            continue;
        };
        if date != day {
            continue;
        }

        stats.count += 1;
        match item.sentiment {
            Sentiment::Positive => stats.positive += 1,
            Sentiment::Negative => stats.negative += 1,
            Sentiment::Neutral => {}
        }
        *stats.topics.entry(item.topic.clone()).or_insert(0) += 1;
    }
    stats
}

/// Recompute today's aggregate from the item list and persist it, repairing
/// whatever was cached (stale day after a restart, partial object, manual
/// edits). Returns the fresh value.
pub async fn refresh_today_stats(storage: &dyn Storage) -> Result<DailyStats> {
    let videos = store::load_videos(storage).await?;
    let stats = fold_daily_stats(&videos, today_local());
    let entries: HashMap<String, Value> = HashMap::from([(
        KEY_TODAY_STATS.to_string(),
        serde_json::to_value(&stats)?,
    )]);
    storage.set(entries).await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassificationMethod;
    use crate::store::MemoryStorage;
    use chrono::{Duration, Utc};

    fn item(id: &str, sentiment: Sentiment, topic: &str, timestamp: i64) -> WatchItem {
        WatchItem {
            id: id.into(),
            title: format!("title {id}"),
            url: format!("https://www.youtube.com/watch?v={id}"),
            is_short_form: false,
            sentiment,
            sentiment_confidence: 0.7,
            sentiment_method: ClassificationMethod::Local,
            topic: topic.into(),
            topic_confidence: 0.6,
            topic_alternatives: Vec::new(),
            topic_method: ClassificationMethod::Local,
            watch_duration_ms: 15_000,
            timestamp,
        }
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    #[tokio::test]
    async fn recording_twice_with_same_id_stores_once() {
        let storage = Arc::new(MemoryStorage::new());
        let recorder = Recorder::new(storage.clone());

        let first = recorder
            .record(item("vid1", Sentiment::Positive, "music", now_ms()))
            .await
            .unwrap();
        assert!(matches!(first, RecordOutcome::Stored { .. }));

        let second = recorder
            .record(item("vid1", Sentiment::Negative, "news", now_ms()))
            .await
            .unwrap();
        assert_eq!(second, RecordOutcome::Duplicate);

        let videos = store::load_videos(&*storage).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].sentiment, Sentiment::Positive);
    }

    #[tokio::test]
    async fn stats_match_an_independent_fold() {
        let storage = Arc::new(MemoryStorage::new());
        let recorder = Recorder::new(storage.clone());

        let ts = now_ms();
        for (id, sentiment, topic) in [
            ("a", Sentiment::Positive, "music"),
            ("b", Sentiment::Negative, "news"),
            ("c", Sentiment::Neutral, "music"),
            ("d", Sentiment::Positive, "food"),
        ] {
            recorder.record(item(id, sentiment, topic, ts)).await.unwrap();
        }

        let stored = store::load_today_stats(&*storage).await.unwrap();
        let videos = store::load_videos(&*storage).await.unwrap();
        let folded = fold_daily_stats(&videos, today_local());
        assert_eq!(stored, folded);

        assert_eq!(stored.count, 4);
        assert!(stored.positive + stored.negative <= stored.count);
        assert_eq!(stored.topics.values().sum::<u64>(), stored.count);
        assert_eq!(stored.topics["music"], 2);
    }

    #[tokio::test]
    async fn items_from_other_days_stay_out_of_today() {
        let storage = Arc::new(MemoryStorage::new());
        let recorder = Recorder::new(storage.clone());

        let two_days_ago = (Utc::now() - Duration::days(2)).timestamp_millis();
        recorder
            .record(item("old", Sentiment::Positive, "music", two_days_ago))
            .await
            .unwrap();
        recorder
            .record(item("new", Sentiment::Negative, "news", now_ms()))
            .await
            .unwrap();

        let stats = store::load_today_stats(&*storage).await.unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.negative, 1);
        assert_eq!(stats.positive, 0);
    }

    #[tokio::test]
    async fn nudge_fires_on_each_third_negative() {
        let storage = Arc::new(MemoryStorage::new());
        let recorder = Recorder::new(storage.clone());

        let mut nudges = Vec::new();
        for n in 0..7 {
            let outcome = recorder
                .record(item(&format!("neg{n}"), Sentiment::Negative, "news", now_ms()))
                .await
                .unwrap();
            if let RecordOutcome::Stored { nudge, .. } = outcome {
                nudges.push(nudge);
            }
        }
        assert_eq!(nudges, vec![false, false, true, false, false, true, false]);
    }

    #[tokio::test]
    async fn refresh_repairs_stale_cached_stats() {
        let storage = Arc::new(MemoryStorage::new());
        let recorder = Recorder::new(storage.clone());
        recorder
            .record(item("a", Sentiment::Positive, "music", now_ms()))
            .await
            .unwrap();

        // Simulate a stale aggregate left behind by a previous day.
        storage
            .set(HashMap::from([(
                KEY_TODAY_STATS.to_string(),
                serde_json::json!({ "count": 99, "positive": 50, "negative": 40 }),
            )]))
            .await
            .unwrap();

        let repaired = refresh_today_stats(&*storage).await.unwrap();
        assert_eq!(repaired.count, 1);
        assert_eq!(repaired.positive, 1);
        assert_eq!(store::load_today_stats(&*storage).await.unwrap(), repaired);
    }
}
