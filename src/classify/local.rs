use crate::models::{Sentiment, TopicAlternative};

/// Lexicon hits are substring matches over normalized text, so a handful of
/// stems ("wins", "excited") cover their inflections well enough for titles.
const POSITIVE_LEXICON: &[&str] = &[
    "amazing",
    "awesome",
    "great",
    "love",
    "best",
    "incredible",
    "wonderful",
    "fantastic",
    "excellent",
    "beautiful",
    "happy",
    "excited",
    "success",
    "wins",
    "calm",
];

const NEGATIVE_LEXICON: &[&str] = &[
    "terrible",
    "awful",
    "hate",
    "worst",
    "horrible",
    "disgusting",
    "annoying",
    "stupid",
    "bad",
    "sucks",
    "angry",
    "sad",
    "anxious",
    "fear",
    "panic",
    "failure",
];

/// Candidate topics with their keyword tables. Table order doubles as the
/// tie-break priority when two topics score the same hit count.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "music",
        &[
            "music", "song", "album", "artist", "band", "concert", "lyrics", "beat", "singer",
            "guitar",
        ],
    ),
    (
        "food",
        &[
            "food", "cook", "cooking", "recipe", "kitchen", "chef", "restaurant", "meal", "pizza",
            "burger", "pasta",
        ],
    ),
    (
        "news",
        &[
            "news", "breaking", "politics", "government", "election", "economy", "update",
            "report",
        ],
    ),
    (
        "entertainment",
        &[
            "funny", "comedy", "movie", "series", "tv", "celebrity", "gossip", "trailer",
            "interview",
        ],
    ),
    (
        "education",
        &[
            "tutorial", "learn", "lesson", "explained", "course", "study", "guide", "exam",
            "math", "science",
        ],
    ),
    (
        "lifestyle",
        &[
            "vlog", "daily", "routine", "travel", "fashion", "beauty", "home", "minimal",
            "wellness",
        ],
    ),
    (
        "gaming",
        &[
            "game",
            "gaming",
            "playthrough",
            "walkthrough",
            "livestream",
            "tournament",
            "speedrun",
            "esports",
            "minecraft",
            "fortnite",
        ],
    ),
    (
        "technology",
        &[
            "tech",
            "software",
            "hardware",
            "coding",
            "programming",
            "ai",
            "robotics",
            "engineering",
            "build",
            "gadget",
        ],
    ),
    (
        "sports",
        &[
            "sport",
            "soccer",
            "football",
            "basketball",
            "highlights",
            "match",
            "game-winning",
            "athlete",
            "training",
        ],
    ),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentScore {
    pub sentiment: Sentiment,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicScore {
    pub topic: String,
    pub confidence: f64,
    pub alternatives: Vec<TopicAlternative>,
}

/// Lowercase, drop `#`/`@` markers, collapse whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace(['#', '@'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Majority polarity wins; confidence grows with the hit margin and stays
/// inside [0.5, 0.95]. Zero hits or a tie scores neutral at exactly 0.5.
pub fn score_sentiment(normalized: &str) -> SentimentScore {
    let positive_hits = count_hits(normalized, POSITIVE_LEXICON);
    let negative_hits = count_hits(normalized, NEGATIVE_LEXICON);

    if positive_hits == negative_hits {
        return SentimentScore {
            sentiment: Sentiment::Neutral,
            confidence: 0.5,
        };
    }

    let margin = positive_hits.abs_diff(negative_hits);
    let confidence = (0.6 + 0.05 * margin as f64).min(0.95);
    let sentiment = if positive_hits > negative_hits {
        Sentiment::Positive
    } else {
        Sentiment::Negative
    };

    SentimentScore {
        sentiment,
        confidence,
    }
}

/// Best keyword-hit topic wins; zero hits fall through to `other`. Up to
/// three runner-ups with at least one hit become alternatives.
pub fn score_topics(normalized: &str) -> TopicScore {
    let mut scored: Vec<(&str, usize)> = TOPIC_KEYWORDS
        .iter()
        .map(|(topic, keywords)| (*topic, count_hits(normalized, keywords)))
        .collect();

    // Stable sort keeps table order as the tie break.
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let (best_topic, best_hits) = scored[0];
    if best_hits == 0 {
        return TopicScore {
            topic: "other".into(),
            confidence: 0.4,
            alternatives: Vec::new(),
        };
    }

    let alternatives = scored[1..]
        .iter()
        .filter(|(_, hits)| *hits > 0)
        .take(3)
        .map(|(topic, hits)| TopicAlternative {
            topic: (*topic).into(),
            confidence: (0.45 + 0.08 * *hits as f64).min(0.8),
        })
        .collect();

    TopicScore {
        topic: best_topic.into(),
        confidence: (0.55 + 0.1 * best_hits as f64).min(0.95),
        alternatives,
    }
}

fn count_hits(text: &str, words: &[&str]) -> usize {
    words.iter().filter(|word| text.contains(*word)).count()
}
