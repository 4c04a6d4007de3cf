mod cache;
pub mod local;
pub mod remote;

pub use local::{SentimentScore, TopicScore};
pub use remote::{RemoteClassifier, CANDIDATE_TOPICS};

use log::warn;

use crate::config::RemoteConfig;
use crate::extract;
use crate::models::{ClassificationMethod, Sentiment, TopicAlternative};

use cache::{cache_key, ResponseCache};

/// Combined sentiment + topic verdict for one piece of title text.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub sentiment_confidence: f64,
    pub sentiment_method: ClassificationMethod,
    pub topic: String,
    pub topic_confidence: f64,
    pub topic_alternatives: Vec<TopicAlternative>,
    pub topic_method: ClassificationMethod,
}

impl Classification {
    /// Verdict for text that must not be classified at all (placeholder or
    /// too-short titles). Short-form content defaults to entertainment.
    pub fn default_for(is_short_form: bool) -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            sentiment_confidence: 0.5,
            sentiment_method: ClassificationMethod::Default,
            topic: if is_short_form { "entertainment" } else { "other" }.into(),
            topic_confidence: 0.5,
            topic_alternatives: Vec::new(),
            topic_method: ClassificationMethod::Default,
        }
    }

    /// Verdict applied when the classification task itself died. Tagged so
    /// the failure stays visible in the recorded item.
    pub fn error_fallback() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            sentiment_confidence: 0.5,
            sentiment_method: ClassificationMethod::Error,
            topic: "other".into(),
            topic_confidence: 0.5,
            topic_alternatives: Vec::new(),
            topic_method: ClassificationMethod::Error,
        }
    }
}

/// Two interchangeable strategies behind one call: the remote provider when
/// a credential is configured, the deterministic local scorer otherwise.
/// A remote failure downgrades that call to the local strategy; it never
/// surfaces to the caller.
pub struct Classifier {
    remote: Option<RemoteClassifier>,
    sentiment_cache: ResponseCache<(Sentiment, f64)>,
    topic_cache: ResponseCache<(String, f64, Vec<TopicAlternative>)>,
}

impl Classifier {
    pub fn new(config: &RemoteConfig, token: Option<String>) -> Self {
        let remote = token
            .filter(|token| !token.trim().is_empty())
            .and_then(|token| match RemoteClassifier::new(config, token) {
                Ok(remote) => Some(remote),
                Err(err) => {
                    warn!("remote classifier unavailable, using local strategy: {err:#}");
                    None
                }
            });

        Self {
            remote,
            sentiment_cache: ResponseCache::new(config.cache_ttl),
            topic_cache: ResponseCache::new(config.cache_ttl),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Placeholder labels and near-empty titles carry no signal; they get
    /// the documented defaults without touching either strategy.
    pub fn should_skip(title: &str) -> bool {
        extract::is_placeholder_title(title) || title.trim().chars().count() < 5
    }

    pub async fn analyze(&self, title: &str, is_short_form: bool) -> Classification {
        if Self::should_skip(title) {
            return Classification::default_for(is_short_form);
        }

        let normalized = local::normalize(title);
        let (sentiment, topic) = tokio::join!(
            self.sentiment_for(title, &normalized),
            self.topic_for(title, &normalized),
        );

        Classification {
            sentiment: sentiment.0,
            sentiment_confidence: sentiment.1,
            sentiment_method: sentiment.2,
            topic: topic.0,
            topic_confidence: topic.1,
            topic_alternatives: topic.2,
            topic_method: topic.3,
        }
    }

    async fn sentiment_for(
        &self,
        raw: &str,
        normalized: &str,
    ) -> (Sentiment, f64, ClassificationMethod) {
        if let Some(remote) = &self.remote {
            let key = cache_key(remote.sentiment_model(), normalized);
            if let Some((sentiment, confidence)) = self.sentiment_cache.get(&key) {
                return (sentiment, confidence, ClassificationMethod::Remote);
            }
            match remote.classify_sentiment(raw).await {
                Ok((sentiment, confidence)) => {
                    self.sentiment_cache.insert(key, (sentiment, confidence));
                    return (sentiment, confidence, ClassificationMethod::Remote);
                }
                Err(err) => {
                    warn!("remote sentiment failed, falling back to local: {err:#}");
                }
            }
        }

        let scored = local::score_sentiment(normalized);
        (scored.sentiment, scored.confidence, ClassificationMethod::Local)
    }

    async fn topic_for(
        &self,
        raw: &str,
        normalized: &str,
    ) -> (String, f64, Vec<TopicAlternative>, ClassificationMethod) {
        if let Some(remote) = &self.remote {
            let key = cache_key(remote.topic_model(), normalized);
            if let Some((topic, confidence, alternatives)) = self.topic_cache.get(&key) {
                return (topic, confidence, alternatives, ClassificationMethod::Remote);
            }
            match remote.classify_topic(raw).await {
                Ok((topic, confidence, alternatives)) => {
                    self.topic_cache
                        .insert(key, (topic.clone(), confidence, alternatives.clone()));
                    return (topic, confidence, alternatives, ClassificationMethod::Remote);
                }
                Err(err) => {
                    warn!("remote topic failed, falling back to local: {err:#}");
                }
            }
        }

        let scored = local::score_topics(normalized);
        (
            scored.topic,
            scored.confidence,
            scored.alternatives,
            ClassificationMethod::Local,
        )
    }
}
