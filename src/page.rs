/// Snapshot of the observable page at one poll instant.
///
/// Producing this is the embedder's job (DOM reads, media element state);
/// everything downstream only ever sees the snapshot.
#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub url: String,
    /// Document title, the last-resort title source.
    pub page_title: Option<String>,
    /// Long-form title probes in priority order; first non-empty wins.
    pub title_candidates: Vec<String>,
    /// Caption/description text for short-form content.
    pub description: Option<String>,
    pub is_playing: bool,
    pub is_visible: bool,
}

/// Collaborator that reads the current page state on demand.
///
/// Polled by the tracker's tick loops; a purely event-driven source would
/// miss client-side navigation that fires no detectable event, so polling
/// is the primary signal by design.
pub trait PageObserver: Send + Sync {
    fn observe(&self) -> PageState;
}
