// src/ingest/providers/nyt.rs
use async_trait::async_trait;
use std::time::Duration;

use super::{from_date, require_key, send_json, str_at, take_items, Endpoint};
use crate::error::Fault;
use crate::ingest::types::{Article, FetchRequest, RawItem, SourceAdapter};
use crate::ingest::{make_article, ArticleFields};

pub const NAME: &str = "nyt";
const OUTLET: &str = "New York Times";

/// Article Search API. Pages are fixed at 10 docs; `max_results` is applied after normalize.
pub struct NytAdapter {
    ep: Endpoint,
}

impl NytAdapter {
    pub fn new(ep: Endpoint) -> Self {
        Self { ep }
    }

    pub fn query_params(req: &FetchRequest<'_>, key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("q", req.query.to_string()),
            ("begin_date", from_date(req.lookback_days).format("%Y%m%d").to_string()),
            ("sort", "relevance".to_string()),
            ("api-key", key.to_string()),
        ]
    }
}

#[async_trait]
impl SourceAdapter for NytAdapter {
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
            .get(self.ep.url("search/v2/articlesearch.json"))
            .query(&Self::query_params(req, &cred.key));
        let body = send_json(rb, self.ep.timeout).await?;
        take_items(body, &["response", "docs"])
    }

    fn normalize(&self, raw: RawItem) -> Option<Article> {
        make_article(
            NAME,
            OUTLET,
            ArticleFields {
                title: str_at(&raw, &["headline", "main"]),
                url: str_at(&raw, &["web_url"]),
                content: vec![
                    str_at(&raw, &["abstract"]),
                    str_at(&raw, &["lead_paragraph"]),
                    str_at(&raw, &["snippet"]),
                ],
                source: None,
                published: str_at(&raw, &["pub_date"]),
                popularity: None,
            },
        )
    }
}
