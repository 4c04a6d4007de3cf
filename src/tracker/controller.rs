use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::aggregate::{RecordOutcome, Recorder};
use crate::classify::{Classification, Classifier};
use crate::config::TrackerConfig;
use crate::extract;
use crate::models::{VideoInfo, WatchItem};
use crate::page::PageObserver;

use super::state::TrackingSession;

/// Emitted after a stored item pushes today's negative count onto a
/// multiple of three. Rendering the nudge is the UI collaborator's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NudgeEvent {
    pub negative_count: u64,
}

struct TrackerShared {
    session: Option<TrackingSession>,
}

/// Drives the watch-session state machine from polled page observations.
///
/// Three independent tick loops feed it: a detection tick that re-extracts
/// video identity and syncs pause state, a faster URL poll that catches
/// client-side navigation, and an eligibility flush that records
/// long-running sessions the user never navigates away from. Ticks never
/// wait on classification or storage; navigation finalizes are spawned
/// fire-and-forget against the session snapshot.
#[derive(Clone)]
pub struct TrackerController {
    shared: Arc<Mutex<TrackerShared>>,
    observer: Arc<dyn PageObserver>,
    classifier: Arc<Classifier>,
    recorder: Arc<Recorder>,
    config: TrackerConfig,
    tracking_rx: watch::Receiver<bool>,
    nudge_tx: mpsc::UnboundedSender<NudgeEvent>,
    cancel: CancellationToken,
    loops: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TrackerController {
    pub fn new(
        observer: Arc<dyn PageObserver>,
        classifier: Arc<Classifier>,
        recorder: Arc<Recorder>,
        config: TrackerConfig,
        tracking_rx: watch::Receiver<bool>,
        nudge_tx: mpsc::UnboundedSender<NudgeEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(TrackerShared { session: None })),
            observer,
            classifier,
            recorder,
            config,
            tracking_rx,
            nudge_tx,
            cancel: CancellationToken::new(),
            loops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawn the tick loops. Idempotent.
    pub async fn start(&self) {
        let mut loops = self.loops.lock().await;
        if !loops.is_empty() {
            return;
        }
        loops.push(self.spawn_detect_loop());
        loops.push(self.spawn_url_poll_loop());
        loops.push(self.spawn_flush_loop());
        info!("Tracker loops started");
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut loops = self.loops.lock().await;
        for handle in loops.drain(..) {
            if let Err(err) = handle.await {
                error!("tracker loop failed to join: {err}");
            }
        }
    }

    pub fn is_tracking(&self) -> bool {
        *self.tracking_rx.borrow()
    }

    pub async fn current_video(&self) -> Option<VideoInfo> {
        let shared = self.shared.lock().await;
        shared.session.as_ref().map(|session| session.video.clone())
    }

    /// One detection tick: extract identity from the page, then either sync
    /// the running session or roll over to a new one, finalizing the old
    /// session if it earned it. Returns whether a video was identified.
    pub async fn check_video(&self) -> bool {
        let page = self.observer.observe();
        let Some(info) = extract::extract(&page) else {
            return false;
        };
        let playing = page.is_playing && page.is_visible;
        let now = Instant::now();

        let superseded = {
            let mut shared = self.shared.lock().await;
            match &mut shared.session {
                Some(session) if session.video.id == info.id => {
                    session.sync_playing(playing, now);
                    None
                }
                slot => {
                    let previous = slot.take();
                    if self.is_tracking() {
                        let mut video = info;
                        if video.title.is_empty() {
                            video.title = extract::fallback_label(&video.id, video.is_short_form);
                        }
                        info!("Tracking new video '{}' ({})", video.title, video.id);
                        *slot = Some(TrackingSession::begin(video, playing, now));
                    }
                    previous
                }
            }
        };

        if let Some(previous) = superseded {
            self.finalize_superseded(previous, now);
        }

        true
    }

    /// Record the current session once it crosses the minimum watch time,
    /// without ending it. Also the path taken on page-hidden and unload.
    /// Below-threshold sessions are silently left alone.
    pub async fn flush_if_eligible(&self) {
        if !self.is_tracking() {
            return;
        }

        let now = Instant::now();
        let snapshot = {
            let shared = self.shared.lock().await;
            shared.session.as_ref().and_then(|session| {
                if session.is_recorded() {
                    return None;
                }
                Some((
                    session.session_id.clone(),
                    session.video.clone(),
                    session.total_active_ms(now),
                ))
            })
        };

        let Some((session_id, video, watched_ms)) = snapshot else {
            return;
        };
        if watched_ms < self.min_watch_ms() {
            return;
        }

        self.classify_and_record(video, watched_ms, Some(session_id))
            .await;
    }

    /// The page went hidden: run an eligibility check with the time watched
    /// so far, then stop the clock. The session stays, so returning to the
    /// tab resumes it.
    pub async fn page_hidden(&self) {
        self.flush_if_eligible().await;
        let now = Instant::now();
        let mut shared = self.shared.lock().await;
        if let Some(session) = &mut shared.session {
            session.pause(now);
        }
    }

    pub async fn page_visible(&self) {
        let page = self.observer.observe();
        let now = Instant::now();
        let mut shared = self.shared.lock().await;
        if let Some(session) = &mut shared.session {
            session.sync_playing(page.is_playing, now);
        }
    }

    /// Last chance before the page context is destroyed.
    pub async fn page_unload(&self) {
        self.flush_if_eligible().await;
    }

    /// Re-run detection after a URL change. The new page's metadata can lag
    /// the URL, so extraction is retried on an exponential backoff for a
    /// bounded number of attempts.
    pub async fn detect_after_navigation(&self) {
        let mut delay = self.config.navigation_retry_base_delay;
        for attempt in 0..self.config.navigation_retry_attempts.max(1) {
            if attempt > 0 {
                tokio::select! {
                    _ = time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => return,
                }
                delay = (delay * 2).min(self.config.navigation_retry_max_delay);
            }
            if self.check_video().await {
                return;
            }
        }
        debug!("no video identified after navigation retries");
    }

    fn min_watch_ms(&self) -> u64 {
        self.config.min_watch_time.as_millis() as u64
    }

    /// A new video took over. Emit the old session against its start-time
    /// snapshot if it crossed the threshold and was not already recorded.
    fn finalize_superseded(&self, session: TrackingSession, now: Instant) {
        let watched_ms = session.total_active_ms(now);

        if session.is_recorded() {
            debug!("superseded session for {} already recorded", session.video.id);
            return;
        }
        if !self.is_tracking() {
            return;
        }
        if watched_ms < self.min_watch_ms() {
            debug!(
                "discarding session for {} ({watched_ms}ms below minimum)",
                session.video.id
            );
            return;
        }

        info!(
            "Finalizing '{}' ({}) after {watched_ms}ms",
            session.video.title, session.video.id
        );

        let controller = self.clone();
        tokio::spawn(async move {
            controller
                .classify_and_record(session.video, watched_ms, None)
                .await;
        });
    }

    async fn classify_and_record(
        &self,
        video: VideoInfo,
        watched_ms: u64,
        session_id: Option<String>,
    ) {
        let item = self.build_item(video, watched_ms).await;
        match self.recorder.record(item).await {
            Ok(RecordOutcome::Stored { nudge, stats }) => {
                if let Some(session_id) = &session_id {
                    self.mark_recorded(session_id).await;
                }
                if nudge {
                    info!("Nudge condition met ({} negative today)", stats.negative);
                    let _ = self.nudge_tx.send(NudgeEvent {
                        negative_count: stats.negative,
                    });
                }
            }
            Ok(RecordOutcome::Duplicate) => {
                if let Some(session_id) = &session_id {
                    self.mark_recorded(session_id).await;
                }
                debug!("watch item was already stored");
            }
            Err(err) => {
                // Session state is left untouched so the next eligibility
                // check retries the write.
                error!("failed to store watch item: {err:#}");
            }
        }
    }

    async fn build_item(&self, video: VideoInfo, watched_ms: u64) -> WatchItem {
        let classifier = self.classifier.clone();
        let title = video.title.clone();
        let is_short_form = video.is_short_form;

        // Classification runs isolated so a panic inside a strategy cannot
        // take the finalize down with it; the item then carries the error tag.
        let classification =
            match tokio::spawn(async move { classifier.analyze(&title, is_short_form).await }).await
            {
                Ok(classification) => classification,
                Err(err) => {
                    error!("classification task failed: {err}");
                    Classification::error_fallback()
                }
            };

        WatchItem {
            id: video.id,
            title: video.title,
            url: video.url,
            is_short_form: video.is_short_form,
            sentiment: classification.sentiment,
            sentiment_confidence: classification.sentiment_confidence,
            sentiment_method: classification.sentiment_method,
            topic: classification.topic,
            topic_confidence: classification.topic_confidence,
            topic_alternatives: classification.topic_alternatives,
            topic_method: classification.topic_method,
            watch_duration_ms: watched_ms,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    async fn mark_recorded(&self, session_id: &str) {
        let mut shared = self.shared.lock().await;
        if let Some(session) = &mut shared.session {
            if session.session_id == session_id {
                session.mark_recorded();
            }
        }
    }

    fn spawn_detect_loop(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(controller.config.detect_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        controller.check_video().await;
                    }
                    _ = controller.cancel.cancelled() => break,
                }
            }
        })
    }

    fn spawn_url_poll_loop(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(controller.config.url_poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_url: Option<String> = None;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let url = controller.observer.observe().url;
                        match &last_url {
                            Some(previous) if *previous == url => {}
                            Some(previous) => {
                                debug!("URL changed from {previous} to {url}");
                                last_url = Some(url);
                                controller.detect_after_navigation().await;
                            }
                            None => {
                                last_url = Some(url);
                            }
                        }
                    }
                    _ = controller.cancel.cancelled() => break,
                }
            }
        })
    }

    fn spawn_flush_loop(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(controller.config.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; skip it so a flush
            // never runs before any time was watched.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        controller.flush_if_eligible().await;
                    }
                    _ = controller.cancel.cancelled() => break,
                }
            }
        })
    }
}
