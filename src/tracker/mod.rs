mod controller;
mod state;

pub use controller::{NudgeEvent, TrackerController};
pub use state::{TrackingSession, WatchPhase};
