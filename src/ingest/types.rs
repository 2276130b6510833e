// src/ingest/types.rs
use crate::config::Credential;
use crate::error::Fault;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::sources::DEFAULT_FETCH_TIMEOUT_MS;

/// One canonical article, whatever provider served it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub content: String,
    /// Publishing outlet ("The Guardian"), not the provider that served it.
    pub source: String,
    /// Provider id ("guardian", "newsapi", ...).
    pub provider: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub popularity_signal: Option<f64>,
    #[serde(default)]
    pub sentiment_score: f32,
    #[serde(default)]
    pub relevance_score: f32,
    #[serde(default)]
    pub combined_score: f32,
}

impl Article {
    /// Text used for ranking: content, else title.
    pub fn text(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.title
        } else {
            &self.content
        }
    }
}

/// Provider payload item before normalization. Never leaves the adapter boundary.
pub type RawItem = serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub query: &'a str,
    pub lookback_days: u32,
    pub max_results: usize,
    pub credential: Option<&'a Credential>,
}

/// A provider integration: one HTTP call, one envelope, one record shape.
///
/// Implementations never retry; the orchestrator owns retries and quota accounting.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Mandatory bound for one `fetch` call.
    fn timeout(&self) -> Duration {
        Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS)
    }

    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<Vec<RawItem>, Fault>;

    /// `None` drops the item (e.g. no usable text after fallbacks).
    fn normalize(&self, raw: RawItem) -> Option<Article>;
}
