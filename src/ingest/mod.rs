// src/ingest/mod.rs
pub mod orchestrator;
pub mod providers;
pub mod types;

use crate::ingest::types::Article;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::HashSet;

pub use orchestrator::{FetchOrchestrator, FetchReport, FetchResult};
pub use types::{FetchRequest, RawItem, SourceAdapter};

pub const NO_TITLE: &str = "No title available";
pub const NO_URL: &str = "#";
const CONTENT_CAP_CHARS: usize = 5_000;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_requests_total", "Provider calls dispatched.");
        describe_counter!(
            "fetch_source_errors_total",
            "Provider calls that ended in a fault."
        );
        describe_histogram!("fetch_source_ms", "Per-source fetch time in milliseconds.");
        describe_counter!("quota_denied_total", "Admission denials by local quota.");
        describe_counter!("quota_derated_total", "Quota derates after provider 429s.");
        describe_counter!(
            "credential_evicted_total",
            "Credentials evicted after auth rejection."
        );
        describe_counter!(
            "dedup_removed_total",
            "Articles removed as exact-title duplicates."
        );
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("static regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Normalize provider text: entities, tags, quotes, whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    let out = RE_TAGS.replace_all(&out, " ");

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Loosely-typed fields pulled out of a provider item.
#[derive(Debug, Default, Clone)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub url: Option<String>,
    /// Candidates in fallback order; the first non-empty after normalization wins.
    pub content: Vec<Option<String>>,
    pub source: Option<String>,
    pub published: Option<String>,
    pub popularity: Option<f64>,
}

/// Canonicalize extracted fields into an `Article`, or drop it when no content survives.
pub fn make_article(provider: &str, default_source: &str, f: ArticleFields) -> Option<Article> {
    let content = f
        .content
        .into_iter()
        .flatten()
        .map(|c| normalize_text(&c))
        .find(|c| !c.is_empty())?;
    let content = if content.chars().count() > CONTENT_CAP_CHARS {
        content.chars().take(CONTENT_CAP_CHARS).collect()
    } else {
        content
    };

    let title = f
        .title
        .map(|t| normalize_text(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());
    let url = f
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| NO_URL.to_string());
    let source = f
        .source
        .map(|s| normalize_text(&s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default_source.to_string());

    Some(Article {
        title,
        url,
        content,
        source,
        provider: provider.to_string(),
        published_at: f.published.as_deref().and_then(parse_published),
        popularity_signal: f.popularity.filter(|p| p.is_finite() && *p >= 0.0),
        sentiment_score: 0.0,
        relevance_score: 0.0,
        combined_score: 0.0,
    })
}

/// RFC 3339 first, then the offset-without-colon and date-only shapes some providers emit.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(ndt.and_utc());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ndt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// Drop later articles whose title exactly matches an earlier one. Stable.
pub fn dedup(articles: Vec<Article>) -> Vec<Article> {
    ensure_metrics_described();
    let before = articles.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    let kept: Vec<Article> = articles
        .into_iter()
        .filter(|a| seen.insert(a.title.clone()))
        .collect();

    let removed = before - kept.len();
    if removed > 0 {
        counter!("dedup_removed_total").increment(removed as u64);
        tracing::debug!(removed, kept = kept.len(), "dedup");
    }
    kept
}
