use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

use crate::aggregate;
use crate::models::DailyStats;
use crate::store::{self, Storage, KEY_TODAY_STATS};

/// Archives the closing day's aggregate at local midnight, resets the
/// running aggregate, and reschedules itself for the following midnight.
pub struct RolloverScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RolloverScheduler {
    pub fn start(storage: Arc<dyn Storage>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                // Captured before the sleep: this is the day being closed,
                // not the day the timer happens to fire in.
                let closing_day = Local::now().date_naive();
                let wait = duration_until_next_midnight();
                info!("Next daily rollover in {}s", wait.as_secs());

                tokio::select! {
                    _ = time::sleep(wait) => {
                        if let Err(err) = run_rollover(&*storage, closing_day).await {
                            error!("daily rollover failed: {err:#}");
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!("rollover task failed to join: {err}");
            }
        }
    }
}

/// Archive `closing_day` and zero the running aggregate in one write.
///
/// The archived value is folded from the item list rather than copied from
/// the cached aggregate, so a stale or damaged cache cannot end up in the
/// archive. Item timestamps keep "today" honest after the reset: any item
/// recorded past midnight folds into the new day on its own.
pub async fn run_rollover(storage: &dyn Storage, closing_day: NaiveDate) -> Result<()> {
    let videos = store::load_videos(storage).await?;
    let closed = aggregate::fold_daily_stats(&videos, closing_day);

    let entries = HashMap::from([
        (
            store::archive_key(closing_day),
            serde_json::to_value(&closed)?,
        ),
        (
            KEY_TODAY_STATS.to_string(),
            serde_json::to_value(DailyStats::zero())?,
        ),
    ]);
    storage.set(entries).await?;

    info!(
        "Archived stats for {closing_day} ({} items), running aggregate reset",
        closed.count
    );
    Ok(())
}

fn duration_until_next_midnight() -> Duration {
    let now = Local::now();
    let next_midnight = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|dt| dt.and_local_timezone(Local).earliest());

    match next_midnight {
        Some(next) => (next - now)
            .to_std()
            .unwrap_or_else(|_| Duration::from_secs(60)),
        // Unrepresentable date arithmetic; try again in a day.
        None => Duration::from_secs(24 * 60 * 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassificationMethod, Sentiment, WatchItem};
    use crate::store::MemoryStorage;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn rollover_archives_the_closed_day_and_resets() {
        let storage = Arc::new(MemoryStorage::new());
        let today = Local::now().date_naive();
        let yesterday = today.pred_opt().unwrap();

        let videos = vec![
            item_on("y1", yesterday, Sentiment::Positive),
            item_on("y2", yesterday, Sentiment::Negative),
            item_on("t1", today, Sentiment::Positive),
        ];
        let pre_rollover = aggregate::fold_daily_stats(&videos, yesterday);
        storage
            .set(HashMap::from([
                (
                    store::KEY_VIDEOS.to_string(),
                    serde_json::to_value(&videos).unwrap(),
                ),
                (
                    KEY_TODAY_STATS.to_string(),
                    serde_json::to_value(&pre_rollover).unwrap(),
                ),
            ]))
            .await
            .unwrap();

        run_rollover(&*storage, yesterday).await.unwrap();

        let key = store::archive_key(yesterday);
        let archived = storage.get(&[key.as_str()]).await.unwrap();
        let archived: DailyStats = serde_json::from_value(archived[&key].clone()).unwrap();
        assert_eq!(archived, pre_rollover);
        assert_eq!(archived.count, 2);
        assert_eq!(archived.positive, 1);
        assert_eq!(archived.negative, 1);

        let running = store::load_today_stats(&*storage).await.unwrap();
        assert_eq!(running, DailyStats::zero());

        // Yesterday's items stay out of a fresh fold for today.
        let refreshed = aggregate::refresh_today_stats(&*storage).await.unwrap();
        assert_eq!(refreshed.count, 1);
        assert_eq!(refreshed.positive, 1);
    }

    fn item_on(id: &str, day: NaiveDate, sentiment: Sentiment) -> WatchItem {
        // Noon local time is safely inside the day in every timezone.
        let noon = day.and_hms_opt(12, 0, 0).unwrap();
        let timestamp = Local
            .from_local_datetime(&noon)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
            .unwrap();

        WatchItem {
            id: id.into(),
            title: format!("title {id}"),
            url: format!("https://www.youtube.com/watch?v={id}"),
            is_short_form: false,
            sentiment,
            sentiment_confidence: 0.7,
            sentiment_method: ClassificationMethod::Local,
            topic: "music".into(),
            topic_confidence: 0.6,
            topic_alternatives: Vec::new(),
            topic_method: ClassificationMethod::Local,
            watch_duration_ms: 20_000,
            timestamp,
        }
    }

    #[test]
    fn next_midnight_is_within_a_day() {
        let wait = duration_until_next_midnight();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(24 * 60 * 60));
    }
}
