// src/ingest/providers/guardian.rs
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{from_date, require_key, send_json, str_at, take_items, Endpoint};
use crate::error::Fault;
use crate::ingest::types::{Article, FetchRequest, RawItem, SourceAdapter};
use crate::ingest::{make_article, ArticleFields};

pub const NAME: &str = "guardian";
const OUTLET: &str = "The Guardian";

pub struct GuardianAdapter {
    ep: Endpoint,
}

impl GuardianAdapter {
    pub fn new(ep: Endpoint) -> Self {
        Self { ep }
    }

    pub fn query_params(req: &FetchRequest<'_>, key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("q", req.query.to_string()),
            ("from-date", from_date(req.lookback_days).format("%Y-%m-%d").to_string()),
            ("page-size", req.max_results.clamp(1, 50).to_string()),
            ("order-by", "relevance".to_string()),
            ("show-fields", "bodyText,trailText".to_string()),
            ("api-key", key.to_string()),
        ]
    }

    fn check_envelope(body: &Value) -> Result<(), Fault> {
        match str_at(body, &["response", "status"]).as_deref() {
            Some("error") => Err(Fault::Parse(
                str_at(body, &["response", "message"]).unwrap_or_else(|| "error status".into()),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SourceAdapter for GuardianAdapter {
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
        Self::check_envelope(&body)?;
        take_items(body, &["response", "results"])
    }

    fn normalize(&self, raw: RawItem) -> Option<Article> {
        let title = str_at(&raw, &["webTitle"]);
        make_article(
            NAME,
            OUTLET,
            ArticleFields {
                title: title.clone(),
                url: str_at(&raw, &["webUrl"]),
                content: vec![
                    str_at(&raw, &["fields", "bodyText"]),
                    str_at(&raw, &["fields", "trailText"]),
                    title,
                ],
                source: None,
                published: str_at(&raw, &["webPublicationDate"]),
                popularity: None,
            },
        )
    }
}
