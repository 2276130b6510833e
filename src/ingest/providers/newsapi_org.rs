// src/ingest/providers/newsapi_org.rs
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;

use super::{from_date, require_key, send_json, str_at, take_items, Endpoint};
use crate::error::Fault;
use crate::ingest::types::{Article, FetchRequest, RawItem, SourceAdapter};
use crate::ingest::{make_article, ArticleFields};

pub const NAME: &str = "newsapi";

// Free tier truncates content and appends "[+1234 chars]".
static RE_TRUNCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*…?\s*\[\+\d+ chars\]\s*$").expect("static regex"));

pub struct NewsApiOrgAdapter {
    ep: Endpoint,
}

impl NewsApiOrgAdapter {
    pub fn new(ep: Endpoint) -> Self {
        Self { ep }
    }

    pub fn query_params(req: &FetchRequest<'_>) -> Vec<(&'static str, String)> {
        vec![
            ("q", req.query.to_string()),
            ("from", from_date(req.lookback_days).format("%Y-%m-%d").to_string()),
            ("pageSize", req.max_results.clamp(1, 100).to_string()),
            ("language", "en".to_string()),
            ("sortBy", "relevancy".to_string()),
        ]
    }

    /// NewsAPI reports some failures as `{"status":"error","code":...}`.
    pub fn check_envelope(body: &Value) -> Result<(), Fault> {
        if str_at(body, &["status"]).as_deref() != Some("error") {
            return Ok(());
        }
        let code = str_at(body, &["code"]).unwrap_or_default();
        match code.as_str() {
            "rateLimited" => Err(Fault::RateLimited),
            "apiKeyInvalid" | "apiKeyDisabled" | "apiKeyExhausted" | "apiKeyMissing" => {
                Err(Fault::AuthRejected)
            }
            _ => Err(Fault::Parse(
                str_at(body, &["message"]).unwrap_or_else(|| format!("error status ({code})")),
            )),
        }
    }
}

#[async_trait]
impl SourceAdapter for NewsApiOrgAdapter {
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
            .get(self.ep.url("everything"))
            .query(&Self::query_params(req))
            .header("X-Api-Key", &cred.key);
        let body = send_json(rb, self.ep.timeout).await?;
        Self::check_envelope(&body)?;
        take_items(body, &["articles"])
    }

    fn normalize(&self, raw: RawItem) -> Option<Article> {
        let content = str_at(&raw, &["content"])
            .map(|c| RE_TRUNCATION.replace(&c, "").into_owned());
        make_article(
            NAME,
            "NewsAPI",
            ArticleFields {
                title: str_at(&raw, &["title"]),
                url: str_at(&raw, &["url"]),
                content: vec![content, str_at(&raw, &["description"])],
                source: str_at(&raw, &["source", "name"]),
                published: str_at(&raw, &["publishedAt"]),
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

    fn adapter() -> NewsApiOrgAdapter {
        NewsApiOrgAdapter::new(Endpoint::from_config(
            &SourceConfig::new(ProviderKind::NewsApiOrg),
            reqwest::Client::new(),
        ))
    }

    #[test]
    fn normalizes_and_strips_truncation_marker() {
        let raw = json!({
            "source": {"id": null, "name": "Reuters"},
            "title": "AI chips surge",
            "url": "https://example.com/a",
            "description": "short",
            "content": "Chipmakers rallied on Tuesday… [+2345 chars]",
            "publishedAt": "2024-05-01T10:00:00Z"
        });
        let a = adapter().normalize(raw).unwrap();
        assert_eq!(a.source, "Reuters");
        assert_eq!(a.provider, NAME);
        assert_eq!(a.content, "Chipmakers rallied on Tuesday");
        assert!(a.published_at.is_some());
    }

    #[test]
    fn description_is_content_fallback() {
        let raw = json!({"title": "t", "content": null, "description": "desc", "source": {}});
        let a = adapter().normalize(raw).unwrap();
        assert_eq!(a.content, "desc");
        assert_eq!(a.source, "NewsAPI");
    }

    #[test]
    fn error_envelope_maps_to_faults() {
        let limited = json!({"status": "error", "code": "rateLimited", "message": "slow down"});
        assert_eq!(NewsApiOrgAdapter::check_envelope(&limited), Err(Fault::RateLimited));
        let bad_key = json!({"status": "error", "code": "apiKeyInvalid"});
        assert_eq!(NewsApiOrgAdapter::check_envelope(&bad_key), Err(Fault::AuthRejected));
        assert!(NewsApiOrgAdapter::check_envelope(&json!({"status": "ok"})).is_ok());
    }

    #[test]
    fn page_size_is_capped() {
        let req = FetchRequest {
            query: "ai",
            lookback_days: 3,
            max_results: 500,
            credential: None,
        };
        let params = NewsApiOrgAdapter::query_params(&req);
        assert!(params.contains(&("pageSize", "100".to_string())));
    }
}
