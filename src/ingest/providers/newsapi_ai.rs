// src/ingest/providers/newsapi_ai.rs
//! NewsAPI.ai (Event Registry) article search.
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{from_date, num_at, require_key, send_json, str_at, take_items, value_at, Endpoint};
use crate::error::Fault;
use crate::ingest::types::{Article, FetchRequest, RawItem, SourceAdapter};
use crate::ingest::{make_article, ArticleFields};

pub const NAME: &str = "newsapi_ai";

pub struct NewsApiAiAdapter {
    ep: Endpoint,
}

impl NewsApiAiAdapter {
    pub fn new(ep: Endpoint) -> Self {
        Self { ep }
    }

    pub fn query_params(req: &FetchRequest<'_>, key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("apiKey", key.to_string()),
            ("keyword", req.query.to_string()),
            ("dateStart", from_date(req.lookback_days).format("%Y-%m-%d").to_string()),
            ("lang", "eng".to_string()),
            ("resultType", "articles".to_string()),
            ("articlesSortBy", "rel".to_string()),
            ("articlesCount", req.max_results.clamp(1, 100).to_string()),
            ("includeArticleSocialScore", "true".to_string()),
        ]
    }

    pub fn check_envelope(body: &Value) -> Result<(), Fault> {
        let Some(msg) = str_at(body, &["error"]) else {
            return Ok(());
        };
        let lower = msg.to_lowercase();
        if lower.contains("daily") || lower.contains("quota") || lower.contains("tokens") {
            Err(Fault::RateLimited)
        } else if lower.contains("api key") || lower.contains("apikey") {
            Err(Fault::AuthRejected)
        } else {
            Err(Fault::Parse(msg))
        }
    }

    /// Sum of per-network share counts.
    pub fn share_total(raw: &Value) -> Option<f64> {
        let shares = value_at(raw, &["shares"])?.as_object()?;
        let total: f64 = shares
            .keys()
            .filter_map(|net| num_at(raw, &["shares", net.as_str()]))
            .sum();
        Some(total)
    }
}

#[async_trait]
impl SourceAdapter for NewsApiAiAdapter {
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
            .get(self.ep.url("article/getArticles"))
            .query(&Self::query_params(req, &cred.key));
        let body = send_json(rb, self.ep.timeout).await?;
        Self::check_envelope(&body)?;
        take_items(body, &["articles", "results"])
    }

    fn normalize(&self, raw: RawItem) -> Option<Article> {
        let published = str_at(&raw, &["dateTimePub"]).or_else(|| str_at(&raw, &["dateTime"]));
        make_article(
            NAME,
            "NewsAPI.ai",
            ArticleFields {
                title: str_at(&raw, &["title"]),
                url: str_at(&raw, &["url"]),
                content: vec![str_at(&raw, &["body"]), str_at(&raw, &["description"])],
                source: str_at(&raw, &["source", "title"]),
                published,
                popularity: Self::share_total(&raw),
            },
        )
    }
}
