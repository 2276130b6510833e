// src/popularity.rs
//! Fills missing popularity signals before ranking.

use crate::error::Fault;
use crate::ingest::types::Article;
use crate::ingest::NO_URL;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait PopularityProbe: Send + Sync {
    fn name(&self) -> &'static str;
    async fn share_count(&self, url: &str) -> Result<f64, Fault>;
}

/// SharedCount URL lookup.
pub struct SharedCountProbe {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl SharedCountProbe {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(3),
        }
    }

    /// `total` when present, else the sum of per-network counts.
    pub fn total_from_body(body: &Value) -> f64 {
        if let Some(t) = body.get("total").and_then(Value::as_f64) {
            return t;
        }
        let Some(obj) = body.as_object() else {
            return 0.0;
        };
        obj.values()
            .map(|v| match v {
                Value::Number(n) => n.as_f64().unwrap_or(0.0),
                Value::Object(inner) => inner
                    .get("total_count")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                _ => 0.0,
            })
            .sum()
    }
}

#[async_trait]
impl PopularityProbe for SharedCountProbe {
    fn name(&self) -> &'static str {
        "sharedcount"
    }

    async fn share_count(&self, url: &str) -> Result<f64, Fault> {
        let resp = self
            .http
            .get(format!("{}/", self.base_url))
            .query(&[("url", url), ("apikey", self.api_key.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;
        if let Some(f) = Fault::from_status(resp.status().as_u16()) {
            return Err(f);
        }
        let body: Value = resp.json().await.map_err(|e| Fault::Parse(e.to_string()))?;
        Ok(Self::total_from_body(&body))
    }
}

/// Probe every article lacking a signal; failures count as 0.
pub async fn enrich_popularity(
    articles: &mut [Article],
    probe: &dyn PopularityProbe,
    concurrency: usize,
) {
    let pending: Vec<(usize, String)> = articles
        .iter()
        .enumerate()
        .filter(|(_, a)| a.popularity_signal.is_none() && a.url != NO_URL)
        .map(|(i, a)| (i, a.url.clone()))
        .collect();
    if pending.is_empty() {
        return;
    }

    let results: Vec<(usize, f64)> = stream::iter(pending)
        .map(|(i, url)| async move {
            let count = match probe.share_count(&url).await {
                Ok(c) if c.is_finite() && c >= 0.0 => c,
                Ok(_) => 0.0,
                Err(e) => {
                    debug!(probe = probe.name(), error = %e, "share count unavailable");
                    0.0
                }
            };
            (i, count)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    for (i, count) in results {
        articles[i].popularity_signal = Some(count);
    }
}
