use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::{mpsc, watch};

use crate::aggregate::{self, Recorder};
use crate::classify::Classifier;
use crate::config::MonitorConfig;
use crate::messaging::MessageRouter;
use crate::page::PageObserver;
use crate::rollover::RolloverScheduler;
use crate::store::{self, Storage};
use crate::tracker::{NudgeEvent, TrackerController};

/// Composition root for one page context: wires the storage collaborator,
/// classifier, tracker loops, rollover scheduler, and UI message router
/// together and owns their lifetimes.
pub struct Monitor {
    storage: Arc<dyn Storage>,
    tracker: TrackerController,
    router: MessageRouter,
    rollover: RolloverScheduler,
    nudges: Option<mpsc::UnboundedReceiver<NudgeEvent>>,
}

impl Monitor {
    pub async fn start(
        observer: Arc<dyn PageObserver>,
        storage: Arc<dyn Storage>,
        config: MonitorConfig,
    ) -> Result<Self> {
        store::seed_defaults_if_missing(&*storage).await?;

        // A restart can leave the cached aggregate stamped by an earlier
        // day; recompute before anything reads it.
        aggregate::refresh_today_stats(&*storage).await?;

        let is_tracking = store::load_is_tracking(&*storage).await?;
        let api_token = match config.api_token.clone() {
            Some(token) => Some(token),
            None => store::load_api_token(&*storage).await?,
        };

        let classifier = Arc::new(Classifier::new(&config.remote, api_token));
        info!(
            "Classification strategy: {}",
            if classifier.has_remote() {
                "remote with local fallback"
            } else {
                "local"
            }
        );

        let recorder = Arc::new(Recorder::new(storage.clone()));
        let (tracking_tx, tracking_rx) = watch::channel(is_tracking);
        let (nudge_tx, nudge_rx) = mpsc::unbounded_channel();

        let tracker = TrackerController::new(
            observer,
            classifier,
            recorder.clone(),
            config.tracker.clone(),
            tracking_rx,
            nudge_tx,
        );
        tracker.start().await;

        let rollover = RolloverScheduler::start(storage.clone());
        let router = MessageRouter::new(storage.clone(), recorder, tracking_tx);

        Ok(Self {
            storage,
            tracker,
            router,
            rollover,
            nudges: Some(nudge_rx),
        })
    }

    pub fn tracker(&self) -> &TrackerController {
        &self.tracker
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    /// Nudge event stream for the UI collaborator. Can be taken once.
    pub fn take_nudges(&mut self) -> Option<mpsc::UnboundedReceiver<NudgeEvent>> {
        self.nudges.take()
    }

    pub async fn shutdown(mut self) {
        self.tracker.shutdown().await;
        self.rollover.shutdown().await;
        info!("Monitor shut down");
    }
}
