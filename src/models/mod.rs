pub mod stats;
pub mod video;

pub use stats::DailyStats;
pub use video::{ClassificationMethod, Sentiment, TopicAlternative, VideoInfo, WatchItem};
