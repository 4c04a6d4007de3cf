use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::aggregate::{self, RecordOutcome, Recorder};
use crate::models::{DailyStats, WatchItem};
use crate::store::{self, Storage, KEY_IS_TRACKING};

/// Actions a UI collaborator (popup, dashboard) can send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetStats,
    ClearData,
    StoreVideo {
        data: WatchItem,
    },
    ExportData,
    #[serde(rename_all = "camelCase")]
    ToggleTracking {
        is_tracking: bool,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub today_stats: DailyStats,
    pub total_videos: usize,
    pub is_tracking: bool,
}

/// Full snapshot for file download.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub export_date: String,
    pub videos: Vec<WatchItem>,
    pub today_stats: DailyStats,
    pub total_videos: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Stats(StatsSnapshot),
    Export(ExportSnapshot),
    #[serde(rename_all = "camelCase")]
    Stored { stored: bool, duplicate: bool },
    #[serde(rename_all = "camelCase")]
    Tracking { is_tracking: bool },
    Cleared { success: bool },
}

/// Request dispatcher for the UI-facing actions.
///
/// Stats responses are always folded fresh from the item list, never read
/// from the cached aggregate, so a malformed or stale cache can't reach
/// the UI.
pub struct MessageRouter {
    storage: Arc<dyn Storage>,
    recorder: Arc<Recorder>,
    tracking_tx: watch::Sender<bool>,
}

impl MessageRouter {
    pub fn new(
        storage: Arc<dyn Storage>,
        recorder: Arc<Recorder>,
        tracking_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            storage,
            recorder,
            tracking_tx,
        }
    }

    pub async fn handle(&self, request: Request) -> Result<Response> {
        match request {
            Request::GetStats => {
                let videos = store::load_videos(&*self.storage).await?;
                let today_stats = aggregate::fold_daily_stats(&videos, aggregate::today_local());
                let is_tracking = store::load_is_tracking(&*self.storage).await?;
                Ok(Response::Stats(StatsSnapshot {
                    today_stats,
                    total_videos: videos.len(),
                    is_tracking,
                }))
            }
            Request::ClearData => {
                self.storage.clear().await?;
                self.storage.set(store::default_entries()).await?;
                info!("Stored data cleared, defaults reseeded");
                Ok(Response::Cleared { success: true })
            }
            Request::StoreVideo { data } => match self.recorder.record(data).await? {
                RecordOutcome::Stored { .. } => Ok(Response::Stored {
                    stored: true,
                    duplicate: false,
                }),
                RecordOutcome::Duplicate => Ok(Response::Stored {
                    stored: false,
                    duplicate: true,
                }),
            },
            Request::ExportData => {
                let videos = store::load_videos(&*self.storage).await?;
                let today_stats = aggregate::fold_daily_stats(&videos, aggregate::today_local());
                Ok(Response::Export(ExportSnapshot {
                    export_date: Utc::now().to_rfc3339(),
                    total_videos: videos.len(),
                    today_stats,
                    videos,
                }))
            }
            Request::ToggleTracking { is_tracking } => {
                let entries: HashMap<String, Value> =
                    HashMap::from([(KEY_IS_TRACKING.to_string(), Value::Bool(is_tracking))]);
                self.storage.set(entries).await?;
                // Live tracker loops pick the flag up through the watch channel.
                self.tracking_tx.send_replace(is_tracking);
                info!(
                    "Tracking {}",
                    if is_tracking { "enabled" } else { "paused" }
                );
                Ok(Response::Tracking { is_tracking })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassificationMethod, Sentiment};
    use crate::store::MemoryStorage;

    fn router() -> (MessageRouter, Arc<MemoryStorage>, watch::Receiver<bool>) {
        let storage = Arc::new(MemoryStorage::new());
        let recorder = Arc::new(Recorder::new(storage.clone()));
        let (tracking_tx, tracking_rx) = watch::channel(true);
        (
            MessageRouter::new(storage.clone(), recorder, tracking_tx),
            storage,
            tracking_rx,
        )
    }

    fn sample_item(id: &str) -> WatchItem {
        WatchItem {
            id: id.into(),
            title: format!("title {id}"),
            url: format!("https://www.youtube.com/watch?v={id}"),
            is_short_form: false,
            sentiment: Sentiment::Negative,
            sentiment_confidence: 0.65,
            sentiment_method: ClassificationMethod::Local,
            topic: "news".into(),
            topic_confidence: 0.65,
            topic_alternatives: Vec::new(),
            topic_method: ClassificationMethod::Local,
            watch_duration_ms: 11_000,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    #[test]
    fn requests_parse_from_action_tagged_json() {
        let get: Request = serde_json::from_value(serde_json::json!({ "action": "getStats" })).unwrap();
        assert!(matches!(get, Request::GetStats));

        let toggle: Request = serde_json::from_value(
            serde_json::json!({ "action": "toggleTracking", "isTracking": false }),
        )
        .unwrap();
        assert!(matches!(toggle, Request::ToggleTracking { is_tracking: false }));
    }

    #[tokio::test]
    async fn get_stats_on_fresh_storage_returns_defaults() {
        let (router, _storage, _rx) = router();
        let response = router.handle(Request::GetStats).await.unwrap();
        assert_eq!(
            response,
            Response::Stats(StatsSnapshot {
                today_stats: DailyStats::zero(),
                total_videos: 0,
                is_tracking: true,
            })
        );
    }

    #[tokio::test]
    async fn store_video_reports_duplicates() {
        let (router, _storage, _rx) = router();

        let first = router
            .handle(Request::StoreVideo {
                data: sample_item("vid1"),
            })
            .await
            .unwrap();
        assert_eq!(
            first,
            Response::Stored {
                stored: true,
                duplicate: false
            }
        );

        let second = router
            .handle(Request::StoreVideo {
                data: sample_item("vid1"),
            })
            .await
            .unwrap();
        assert_eq!(
            second,
            Response::Stored {
                stored: false,
                duplicate: true
            }
        );
    }

    #[tokio::test]
    async fn clear_data_wipes_and_reseeds() {
        let (router, storage, _rx) = router();
        router
            .handle(Request::StoreVideo {
                data: sample_item("vid1"),
            })
            .await
            .unwrap();

        let response = router.handle(Request::ClearData).await.unwrap();
        assert_eq!(response, Response::Cleared { success: true });

        assert!(store::load_videos(&*storage).await.unwrap().is_empty());
        assert!(store::load_is_tracking(&*storage).await.unwrap());
    }

    #[tokio::test]
    async fn export_carries_items_stats_and_timestamp() {
        let (router, _storage, _rx) = router();
        router
            .handle(Request::StoreVideo {
                data: sample_item("vid1"),
            })
            .await
            .unwrap();

        let Response::Export(snapshot) = router.handle(Request::ExportData).await.unwrap() else {
            panic!("expected export response");
        };
        assert_eq!(snapshot.total_videos, 1);
        assert_eq!(snapshot.videos.len(), 1);
        assert_eq!(snapshot.today_stats.count, 1);
        assert_eq!(snapshot.today_stats.negative, 1);
        // RFC 3339 is parseable back.
        assert!(chrono::DateTime::parse_from_rfc3339(&snapshot.export_date).is_ok());
    }

    #[tokio::test]
    async fn toggle_persists_and_broadcasts() {
        let (router, storage, rx) = router();

        let response = router
            .handle(Request::ToggleTracking { is_tracking: false })
            .await
            .unwrap();
        assert_eq!(response, Response::Tracking { is_tracking: false });
        assert!(!store::load_is_tracking(&*storage).await.unwrap());
        assert!(!*rx.borrow());
    }
}
