use crate::models::VideoInfo;
use crate::page::PageState;

/// Synthesized short-form titles are clipped to this many chars.
const SHORT_TITLE_MAX_CHARS: usize = 80;

/// Caption lines starting with these are soundtrack/audio credits, not
/// content text.
const CAPTION_BOILERPLATE_PREFIXES: &[&str] =
    &["original sound", "sound -", "audio -", "music:"];

/// Derive a stable video identity and best-effort metadata from the page.
///
/// Returns `None` when no video id can be parsed from the URL; callers
/// retry on the next tick. An empty title is still a valid result, the
/// tracker substitutes [`fallback_label`] when it starts a session.
pub fn extract(page: &PageState) -> Option<VideoInfo> {
    let (id, is_short_form) = parse_video_id(&page.url)?;

    let title = if is_short_form {
        synthesize_short_title(page, &id)
    } else {
        probe_long_title(page)
    };

    Some(VideoInfo {
        id,
        title,
        url: page.url.clone(),
        is_short_form,
    })
}

/// Parse the content id out of the URL. Three shapes are recognized:
/// long-form watch links (`watch?v=<id>`), short-link redirects
/// (`youtu.be/<id>`), and short-form paths (`/shorts/<id>`).
pub fn parse_video_id(url: &str) -> Option<(String, bool)> {
    if let Some((_, rest)) = url.split_once("youtube.com/shorts/") {
        let id = take_id(rest);
        if !id.is_empty() {
            return Some((id, true));
        }
    }

    if url.contains("youtube.com/watch") {
        let after = url
            .split_once("?v=")
            .or_else(|| url.split_once("&v="))
            .map(|(_, rest)| rest)?;
        let id = take_id(after);
        if !id.is_empty() {
            return Some((id, false));
        }
    }

    if let Some((_, rest)) = url.split_once("youtu.be/") {
        let id = take_id(rest);
        if !id.is_empty() {
            return Some((id, false));
        }
    }

    None
}

/// Deterministic label for sessions whose extraction produced no title.
pub fn fallback_label(id: &str, is_short_form: bool) -> String {
    if is_short_form {
        format!("Short ({id})")
    } else {
        format!("Video ({id})")
    }
}

/// True for titles produced by [`fallback_label`]. Such text carries no
/// signal and must never reach a classifier.
pub fn is_placeholder_title(title: &str) -> bool {
    (title.starts_with("Short (") || title.starts_with("Video (")) && title.ends_with(')')
}

fn take_id(rest: &str) -> String {
    rest.chars()
        .take_while(|c| !matches!(c, '&' | '?' | '#' | '/') && !c.is_whitespace())
        .collect()
}

/// First non-empty probe wins. Probes are ordered by the embedder; the page
/// title is deliberately not consulted for long-form content.
fn probe_long_title(page: &PageState) -> String {
    page.title_candidates
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Short-form content has no real title; build one from the caption text,
/// then the page title, then a placeholder embedding the id.
fn synthesize_short_title(page: &PageState, id: &str) -> String {
    if let Some(description) = &page.description {
        let cleaned = clean_caption(description);
        if !cleaned.is_empty() {
            return truncate_title(&cleaned);
        }
    }

    if let Some(page_title) = &page.page_title {
        let trimmed = page_title.trim();
        if !trimmed.is_empty() {
            return truncate_title(trimmed);
        }
    }

    fallback_label(id, true)
}

/// Strip audio-credit boilerplate lines and collapse whitespace.
fn clean_caption(raw: &str) -> String {
    let mut kept = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        if CAPTION_BOILERPLATE_PREFIXES
            .iter()
            .any(|prefix| lower.starts_with(prefix))
        {
            continue;
        }
        kept.push(trimmed);
    }

    kept.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_title(text: &str) -> String {
    if text.chars().count() <= SHORT_TITLE_MAX_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(SHORT_TITLE_MAX_CHARS - 1).collect();
    clipped.push('…');
    clipped
}
