use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::VideoInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// The clock is running: an open interval is anchored at `watch_anchor`.
    Active,
    /// Media paused or page hidden; no time accumulates.
    Paused,
}

/// In-memory record of one continuously tracked video, from first detection
/// until it is superseded or the page goes away.
///
/// `video` is the snapshot taken when tracking began; finalize reuses it
/// instead of re-reading the page, so a half-loaded successor can never
/// bleed into the previous video's record. All clock inputs are passed in
/// by the caller, which keeps the transitions deterministic under test.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    pub session_id: String,
    pub video: VideoInfo,
    pub started_at: DateTime<Utc>,
    phase: WatchPhase,
    watch_anchor: Option<Instant>,
    accumulated_active_ms: u64,
    recorded: bool,
}

impl TrackingSession {
    pub fn begin(video: VideoInfo, playing: bool, now: Instant) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            video,
            started_at: Utc::now(),
            phase: if playing {
                WatchPhase::Active
            } else {
                WatchPhase::Paused
            },
            watch_anchor: playing.then_some(now),
            accumulated_active_ms: 0,
            recorded: false,
        }
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// Whether a finalize for this session already reached the store.
    /// A session can stay alive long after its first flush; the flag stops
    /// repeat submissions before they hit the duplicate guard.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    pub fn mark_recorded(&mut self) {
        self.recorded = true;
    }

    /// Fold the open interval into the accumulator and stop the clock.
    pub fn pause(&mut self, now: Instant) {
        if let Some(anchor) = self.watch_anchor.take() {
            let elapsed = now.duration_since(anchor).as_millis() as u64;
            self.accumulated_active_ms = self.accumulated_active_ms.saturating_add(elapsed);
        }
        self.phase = WatchPhase::Paused;
    }

    pub fn resume(&mut self, now: Instant) {
        if self.phase == WatchPhase::Paused {
            self.watch_anchor = Some(now);
            self.phase = WatchPhase::Active;
        }
    }

    /// Apply the observed playing state, transitioning only on change.
    pub fn sync_playing(&mut self, playing: bool, now: Instant) {
        match (self.phase, playing) {
            (WatchPhase::Active, false) => self.pause(now),
            (WatchPhase::Paused, true) => self.resume(now),
            _ => {}
        }
    }

    /// Accumulated active time plus the currently open interval, if any.
    pub fn total_active_ms(&self, now: Instant) -> u64 {
        let open = self
            .watch_anchor
            .map(|anchor| now.duration_since(anchor).as_millis() as u64)
            .unwrap_or(0);
        self.accumulated_active_ms.saturating_add(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    fn video(id: &str) -> VideoInfo {
        VideoInfo {
            id: id.into(),
            title: format!("video {id}"),
            url: format!("https://www.youtube.com/watch?v={id}"),
            is_short_form: false,
        }
    }

    #[test]
    fn begins_paused_when_media_is_not_playing() {
        let t0 = Instant::now();
        let session = TrackingSession::begin(video("a"), false, t0);
        assert_eq!(session.phase(), WatchPhase::Paused);
        assert_eq!(session.total_active_ms(t0 + Duration::from_secs(30)), 0);
    }

    #[test]
    fn pause_time_is_excluded_from_the_total() {
        let t0 = Instant::now();
        let mut session = TrackingSession::begin(video("a"), true, t0);

        // Play 3s, pause for 10s, play 2s more.
        session.pause(t0 + Duration::from_millis(3_000));
        session.resume(t0 + Duration::from_millis(13_000));
        let total = session.total_active_ms(t0 + Duration::from_millis(15_000));

        assert_eq!(total, 5_000);
    }

    #[test]
    fn open_interval_counts_toward_the_total() {
        let t0 = Instant::now();
        let session = TrackingSession::begin(video("a"), true, t0);
        assert_eq!(session.total_active_ms(t0 + Duration::from_millis(1_500)), 1_500);
    }

    #[test]
    fn sync_playing_only_transitions_on_change() {
        let t0 = Instant::now();
        let mut session = TrackingSession::begin(video("a"), true, t0);

        // Repeated "playing" observations must not reset the anchor.
        session.sync_playing(true, t0 + Duration::from_millis(500));
        assert_eq!(session.total_active_ms(t0 + Duration::from_millis(1_000)), 1_000);

        session.sync_playing(false, t0 + Duration::from_millis(1_000));
        session.sync_playing(false, t0 + Duration::from_millis(4_000));
        assert_eq!(session.total_active_ms(t0 + Duration::from_millis(4_000)), 1_000);

        session.sync_playing(true, t0 + Duration::from_millis(4_000));
        assert_eq!(session.total_active_ms(t0 + Duration::from_millis(5_000)), 2_000);
    }

    #[test]
    fn double_pause_does_not_double_count() {
        let t0 = Instant::now();
        let mut session = TrackingSession::begin(video("a"), true, t0);
        session.pause(t0 + Duration::from_millis(2_000));
        session.pause(t0 + Duration::from_millis(9_000));
        assert_eq!(session.total_active_ms(t0 + Duration::from_millis(9_000)), 2_000);
    }
}
