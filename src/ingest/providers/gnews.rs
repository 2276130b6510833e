// src/ingest/providers/gnews.rs
use async_trait::async_trait;
use std::time::Duration;

use super::{from_date, require_key, send_json, str_at, take_items, Endpoint};
use crate::error::Fault;
use crate::ingest::types::{Article, FetchRequest, RawItem, SourceAdapter};
use crate::ingest::{make_article, ArticleFields};

pub const NAME: &str = "gnews";

pub struct GNewsAdapter {
    ep: Endpoint,
}

impl GNewsAdapter {
    pub fn new(ep: Endpoint) -> Self {
        Self { ep }
    }

    pub fn query_params(req: &FetchRequest<'_>, key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("q", req.query.to_string()),
            ("from", format!("{}T00:00:00Z", from_date(req.lookback_days).format("%Y-%m-%d"))),
            ("max", req.max_results.clamp(1, 100).to_string()),
            ("lang", "en".to_string()),
            ("token", key.to_string()),
        ]
    }
}

#[async_trait]
impl SourceAdapter for GNewsAdapter {
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
            .get(self.ep.url("search"))
            .query(&Self::query_params(req, &cred.key));
        let body = send_json(rb, self.ep.timeout).await?;
        take_items(body, &["articles"])
    }

    fn normalize(&self, raw: RawItem) -> Option<Article> {
        make_article(
            NAME,
            "GNews",
            ArticleFields {
                title: str_at(&raw, &["title"]),
                url: str_at(&raw, &["url"]),
                content: vec![str_at(&raw, &["content"]), str_at(&raw, &["description"])],
                source: str_at(&raw, &["source", "name"]),
                published: str_at(&raw, &["publishedAt"]),
                popularity: None,
            },
        )
    }
}
