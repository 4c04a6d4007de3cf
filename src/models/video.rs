use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Default for Sentiment {
    fn default() -> Self {
        Sentiment::Neutral
    }
}

/// How a sentiment or topic value was produced. `Default` marks items whose
/// title was a placeholder or too short to classify at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    Remote,
    Local,
    Error,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicAlternative {
    pub topic: String,
    pub confidence: f64,
}

/// Identity and display metadata captured when a session starts. The same
/// snapshot is reused at finalize time; it is never re-read from the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub url: String,
    pub is_short_form: bool,
}

/// One recorded watch. `id` is the de-duplication key across the stored
/// collection; `timestamp` (epoch ms) buckets the item into a calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub is_short_form: bool,
    pub sentiment: Sentiment,
    pub sentiment_confidence: f64,
    pub sentiment_method: ClassificationMethod,
    pub topic: String,
    pub topic_confidence: f64,
    #[serde(default)]
    pub topic_alternatives: Vec<TopicAlternative>,
    pub topic_method: ClassificationMethod,
    pub watch_duration_ms: u64,
    pub timestamp: i64,
}

impl WatchItem {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Calendar day this item belongs to, in the local timezone.
    pub fn local_date(&self) -> Option<NaiveDate> {
        self.captured_at()
            .map(|dt| dt.with_timezone(&Local).date_naive())
    }
}
