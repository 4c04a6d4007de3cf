use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use crate::config::RemoteConfig;
use crate::models::{Sentiment, TopicAlternative};

/// Fixed label set for zero-shot topic classification.
pub const CANDIDATE_TOPICS: &[&str] = &[
    "music",
    "food",
    "news",
    "entertainment",
    "education",
    "lifestyle",
    "gaming",
    "technology",
    "sports",
    "travel",
    "fashion",
    "beauty",
    "health",
    "fitness",
    "business",
    "science",
    "art",
    "comedy",
    "drama",
    "documentary",
];

/// Client for the hosted inference API. Every call is bounded by the
/// client-level timeout; provider-side model loading is waited for, but a
/// call always resolves to a result or an error. Callers treat any error as
/// "use the local strategy for this call".
pub struct RemoteClassifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    sentiment_model: String,
    topic_model: String,
}

impl RemoteClassifier {
    pub fn new(config: &RemoteConfig, token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build inference HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            token,
            sentiment_model: config.sentiment_model.clone(),
            topic_model: config.topic_model.clone(),
        })
    }

    pub fn sentiment_model(&self) -> &str {
        &self.sentiment_model
    }

    pub fn topic_model(&self) -> &str {
        &self.topic_model
    }

    pub async fn classify_sentiment(&self, text: &str) -> Result<(Sentiment, f64)> {
        let body = json!({
            "inputs": text,
            "options": { "wait_for_model": true, "use_cache": true },
        });
        let model = self.sentiment_model.clone();
        let response = self.post(&model, body).await?;
        parse_sentiment_response(&response)
    }

    pub async fn classify_topic(&self, text: &str) -> Result<(String, f64, Vec<TopicAlternative>)> {
        let body = json!({
            "inputs": text,
            "parameters": { "candidate_labels": CANDIDATE_TOPICS },
        });
        let model = self.topic_model.clone();
        let response = self.post(&model, body).await?;
        parse_topic_response(&response)
    }

    async fn post(&self, model: &str, body: Value) -> Result<Value> {
        let url = format!("{}/{}", self.api_base, model);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("inference request to {model} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("inference API error {status}: {body_text}");
        }

        response
            .json()
            .await
            .context("malformed inference response body")
    }
}

/// The sentiment endpoint returns `[[{label, score}, …]]` ranked best first.
fn parse_sentiment_response(value: &Value) -> Result<(Sentiment, f64)> {
    let ranked = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("sentiment response missing ranked array"))?;
    let top = ranked
        .first()
        .ok_or_else(|| anyhow!("sentiment response is empty"))?;
    let label = top
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("sentiment response missing label"))?;
    let score = top
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("sentiment response missing score"))?;

    Ok((map_sentiment_label(label), score))
}

/// The zero-shot endpoint returns parallel `labels`/`scores` arrays sorted
/// best first; the top label is the topic, the next three are alternatives.
fn parse_topic_response(value: &Value) -> Result<(String, f64, Vec<TopicAlternative>)> {
    let labels = value
        .get("labels")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("topic response missing labels"))?;
    let scores = value
        .get("scores")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("topic response missing scores"))?;

    let mut ranked = labels.iter().zip(scores.iter()).filter_map(|(label, score)| {
        Some((label.as_str()?.to_string(), score.as_f64()?))
    });

    let (topic, confidence) = ranked
        .next()
        .ok_or_else(|| anyhow!("topic response is empty"))?;

    let alternatives = ranked
        .take(3)
        .map(|(topic, confidence)| TopicAlternative { topic, confidence })
        .collect();

    Ok((topic, confidence, alternatives))
}

fn map_sentiment_label(label: &str) -> Sentiment {
    match label {
        "LABEL_0" | "negative" => Sentiment::Negative,
        "LABEL_2" | "positive" => Sentiment::Positive,
        _ => Sentiment::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_provider_labels_to_sentiment() {
        assert_eq!(map_sentiment_label("LABEL_0"), Sentiment::Negative);
        assert_eq!(map_sentiment_label("LABEL_1"), Sentiment::Neutral);
        assert_eq!(map_sentiment_label("LABEL_2"), Sentiment::Positive);
        assert_eq!(map_sentiment_label("positive"), Sentiment::Positive);
        assert_eq!(map_sentiment_label("something-new"), Sentiment::Neutral);
    }

    #[test]
    fn parses_ranked_sentiment_body() {
        let body = json!([[
            { "label": "LABEL_2", "score": 0.91 },
            { "label": "LABEL_1", "score": 0.07 },
        ]]);
        let (sentiment, score) = parse_sentiment_response(&body).unwrap();
        assert_eq!(sentiment, Sentiment::Positive);
        assert!((score - 0.91).abs() < 1e-9);
    }

    #[test]
    fn parses_zero_shot_topic_body_with_alternatives() {
        let body = json!({
            "labels": ["music", "entertainment", "comedy", "art", "news"],
            "scores": [0.62, 0.18, 0.09, 0.06, 0.05],
        });
        let (topic, confidence, alternatives) = parse_topic_response(&body).unwrap();
        assert_eq!(topic, "music");
        assert!((confidence - 0.62).abs() < 1e-9);
        assert_eq!(alternatives.len(), 3);
        assert_eq!(alternatives[0].topic, "entertainment");
        assert_eq!(alternatives[2].topic, "art");
    }

    #[test]
    fn malformed_bodies_are_errors_not_panics() {
        assert!(parse_sentiment_response(&json!({ "error": "loading" })).is_err());
        assert!(parse_sentiment_response(&json!([[]])).is_err());
        assert!(parse_topic_response(&json!({ "labels": ["music"] })).is_err());
    }
}
