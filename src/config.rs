use std::time::Duration;

/// Tunable thresholds and tick intervals for the watch-session tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Minimum accumulated active watch time before a session is ever recorded.
    pub min_watch_time: Duration,

    /// Full detection tick: re-extract video identity and sync pause state.
    pub detect_interval: Duration,

    /// Eligibility flush tick: record the current session once it crosses
    /// the minimum, without ending it.
    pub flush_interval: Duration,

    /// URL poll tick: catches client-side navigation that fires no event.
    pub url_poll_interval: Duration,

    /// Detection retries after a URL change (page metadata can lag the URL).
    pub navigation_retry_attempts: u32,
    pub navigation_retry_base_delay: Duration,
    pub navigation_retry_max_delay: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_watch_time: Duration::from_secs(10),
            detect_interval: Duration::from_secs(2),
            flush_interval: Duration::from_secs(15),
            url_poll_interval: Duration::from_secs(1),
            navigation_retry_attempts: 5,
            navigation_retry_base_delay: Duration::from_millis(500),
            navigation_retry_max_delay: Duration::from_secs(8),
        }
    }
}

/// Remote inference provider settings.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub api_base: String,
    pub sentiment_model: String,
    pub topic_model: String,
    pub request_timeout: Duration,
    /// Identical titles within this window reuse the cached response.
    pub cache_ttl: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api-inference.huggingface.co/models".into(),
            sentiment_model: "cardiffnlp/twitter-roberta-base-sentiment-latest".into(),
            topic_model: "facebook/bart-large-mnli".into(),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Top-level configuration for a monitor instance.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    pub tracker: TrackerConfig,
    pub remote: RemoteConfig,
    /// Overrides the credential stored under `store::KEY_API_TOKEN`.
    /// With neither present, classification runs on the local strategy only.
    pub api_token: Option<String>,
}
