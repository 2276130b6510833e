// src/ingest/providers/mediastack.rs
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;

use super::{from_date, require_key, send_json, str_at, take_items, Endpoint};
use crate::error::Fault;
use crate::ingest::types::{Article, FetchRequest, RawItem, SourceAdapter};
use crate::ingest::{make_article, ArticleFields};

pub const NAME: &str = "mediastack";

pub struct MediastackAdapter {
    ep: Endpoint,
}

impl MediastackAdapter {
    pub fn new(ep: Endpoint) -> Self {
        Self { ep }
    }

    pub fn query_params(req: &FetchRequest<'_>, key: &str) -> Vec<(&'static str, String)> {
        let from = from_date(req.lookback_days).format("%Y-%m-%d");
        let to = Utc::now().date_naive().format("%Y-%m-%d");
        vec![
            ("access_key", key.to_string()),
            ("keywords", req.query.to_string()),
            ("date", format!("{from},{to}")),
            ("languages", "en".to_string()),
            ("sort", "published_desc".to_string()),
            ("limit", req.max_results.clamp(1, 100).to_string()),
        ]
    }

    /// Mediastack can answer 200 with an `error` object; quota exhaustion shows up there.
    pub fn check_envelope(body: &Value) -> Result<(), Fault> {
        let Some(err) = body.get("error").filter(|e| !e.is_null()) else {
            return Ok(());
        };
        let message = str_at(err, &["message"]).unwrap_or_default();
        let code = str_at(err, &["code"]).unwrap_or_default();
        if message.to_lowercase().contains("usage limit") || code == "usage_limit_reached" {
            return Err(Fault::RateLimited);
        }
        if code.contains("access_key") {
            return Err(Fault::AuthRejected);
        }
        Err(Fault::Parse(if message.is_empty() { code } else { message }))
    }
}

#[async_trait]
impl SourceAdapter for MediastackAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.ep.timeout
    }

    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<Vec<RawItem>, Fault> {
        let cred = require_key(req)?;
        let rb = self
            .ep
            .client
            .get(self.ep.url("news"))
            .query(&Self::query_params(req, &cred.key));
        let body = send_json(rb, self.ep.timeout).await?;
        Self::check_envelope(&body)?;
        take_items(body, &["data"])
    }

    fn normalize(&self, raw: RawItem) -> Option<Article> {
        make_article(
            NAME,
            "Mediastack",
            ArticleFields {
                title: str_at(&raw, &["title"]),
                url: str_at(&raw, &["url"]),
                content: vec![str_at(&raw, &["description"])],
                // plain string here, unlike most providers
                source: str_at(&raw, &["source"]),
                published: str_at(&raw, &["published_at"]),
                popularity: None,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderKind, SourceConfig};
    use serde_json::json;

    fn adapter() -> MediastackAdapter {
        MediastackAdapter::new(Endpoint::from_config(
            &SourceConfig::new(ProviderKind::Mediastack),
            reqwest::Client::new(),
        ))
    }

    #[test]
    fn usage_limit_body_is_rate_limit() {
        let body = json!({"error": {"code": "usage_limit_reached", "message": "Your monthly usage limit has been reached."}});
        assert_eq!(MediastackAdapter::check_envelope(&body), Err(Fault::RateLimited));
        let body = json!({"error": {"code": "invalid_access_key", "message": "bad key"}});
        assert_eq!(MediastackAdapter::check_envelope(&body), Err(Fault::AuthRejected));
        assert!(MediastackAdapter::check_envelope(&json!({"data": []})).is_ok());
    }

    #[test]
    fn string_source_and_description_content() {
        let a = adapter()
            .normalize(json!({
                "title": "Markets slip",
                "description": "Stocks fell",
                "url": "https://example.net/m",
                "source": "CNN",
                "published_at": "2024-05-01T10:00:00+00:00"
            }))
            .unwrap();
        assert_eq!(a.source, "CNN");
        assert_eq!(a.content, "Stocks fell");

        assert!(adapter().normalize(json!({"title": "no body"})).is_none());
    }
}
