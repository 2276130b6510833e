// src/ingest/providers/aylien.rs
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{num_at, require_key, send_json, str_at, take_items, value_at, Endpoint};
use crate::error::Fault;
use crate::ingest::types::{Article, FetchRequest, RawItem, SourceAdapter};
use crate::ingest::{make_article, ArticleFields};

pub const NAME: &str = "aylien";

const HEADER_APP_ID: &str = "X-AYLIEN-NewsAPI-Application-ID";
const HEADER_APP_KEY: &str = "X-AYLIEN-NewsAPI-Application-Key";

/// Stories endpoint; authenticates with an application id + key header pair.
pub struct AylienAdapter {
    ep: Endpoint,
}

impl AylienAdapter {
    pub fn new(ep: Endpoint) -> Self {
        Self { ep }
    }

    pub fn query_params(req: &FetchRequest<'_>) -> Vec<(&'static str, String)> {
        vec![
            ("title", req.query.to_string()),
            ("language[]", "en".to_string()),
            ("published_at.start", format!("NOW-{}DAYS", req.lookback_days.max(1))),
            ("published_at.end", "NOW".to_string()),
            ("per_page", req.max_results.clamp(1, 100).to_string()),
            ("sort_by", "relevance".to_string()),
        ]
    }

    /// Latest count per network, summed. Each network holds a time series of counts.
    pub fn social_shares(raw: &Value) -> Option<f64> {
        let networks = value_at(raw, &["social_shares_count"])?.as_object()?;
        let total: f64 = networks
            .values()
            .filter_map(Value::as_array)
            .filter_map(|series| {
                series
                    .iter()
                    .filter_map(|point| num_at(point, &["count"]))
                    .reduce(f64::max)
            })
            .sum();
        Some(total)
    }
}

#[async_trait]
impl SourceAdapter for AylienAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.ep.timeout
    }

    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<Vec<RawItem>, Fault> {
        let cred = require_key(req)?;
        let app_id = cred.app_id.as_deref().ok_or(Fault::AuthRejected)?;
        let rb = self
            .ep
            .client
            .get(self.ep.url("stories"))
            .query(&Self::query_params(req))
            .header(HEADER_APP_ID, app_id)
            .header(HEADER_APP_KEY, &cred.key);
        let body = send_json(rb, self.ep.timeout).await?;
        take_items(body, &["stories"])
    }

    fn normalize(&self, raw: RawItem) -> Option<Article> {
        let first_sentence = value_at(&raw, &["summary", "sentences"])
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .and_then(Value::as_str)
            .map(str::to_string);
        make_article(
            NAME,
            "Aylien",
            ArticleFields {
                title: str_at(&raw, &["title"]),
                url: str_at(&raw, &["links", "permalink"]),
                content: vec![str_at(&raw, &["body"]), first_sentence],
                source: str_at(&raw, &["source", "name"]),
                published: str_at(&raw, &["published_at"]),
                popularity: Self::social_shares(&raw),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderKind, SourceConfig};
    use serde_json::json;

    fn adapter() -> AylienAdapter {
        AylienAdapter::new(Endpoint::from_config(
            &SourceConfig::new(ProviderKind::Aylien),
            reqwest::Client::new(),
        ))
    }

    #[test]
    fn summary_sentence_fallback_and_shares() {
        let a = adapter()
            .normalize(json!({
                "title": "Ports reopen",
                "body": "",
                "summary": {"sentences": ["Ports reopened on Monday.", "Second."]},
                "links": {"permalink": "https://example.com/p"},
                "source": {"name": "Al Jazeera"},
                "published_at": "2024-05-01T10:00:00Z",
                "social_shares_count": {
                    "facebook": [{"count": 10, "fetched_at": "a"}, {"count": 25, "fetched_at": "b"}],
                    "reddit": [{"count": 5}],
                    "linkedin": []
                }
            }))
            .unwrap();
        assert_eq!(a.content, "Ports reopened on Monday.");
        assert_eq!(a.url, "https://example.com/p");
        assert_eq!(a.source, "Al Jazeera");
        assert_eq!(a.popularity_signal, Some(30.0));
    }

    #[tokio::test]
    async fn missing_app_id_is_auth_rejection() {
        let cred = crate::config::Credential::new("aylien-1", "key");
        let req = FetchRequest {
            query: "ai",
            lookback_days: 7,
            max_results: 5,
            credential: Some(&cred),
        };
        assert_eq!(adapter().fetch(&req).await, Err(Fault::AuthRejected));
    }
}
