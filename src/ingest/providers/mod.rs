// src/ingest/providers/mod.rs
//! One adapter per external news service.
//!
//! Adapters share the HTTP plumbing below: a bounded GET, status mapping onto `Fault`,
//! and small helpers for walking loosely-typed JSON envelopes.

pub mod aylien;
pub mod gnews;
pub mod guardian;
pub mod mediastack;
pub mod newsapi_ai;
pub mod newsapi_org;
pub mod nyt;

use crate::config::{Credential, ProviderKind, SourceConfig};
use crate::error::Fault;
use crate::ingest::types::{FetchRequest, SourceAdapter};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub use aylien::AylienAdapter;
pub use gnews::GNewsAdapter;
pub use guardian::GuardianAdapter;
pub use mediastack::MediastackAdapter;
pub use newsapi_ai::NewsApiAiAdapter;
pub use newsapi_org::NewsApiOrgAdapter;
pub use nyt::NytAdapter;

/// Connection details every HTTP adapter carries.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub client: reqwest::Client,
    pub base_url: String,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn from_config(cfg: &SourceConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            timeout: cfg.timeout(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Build one adapter per configured provider, in configuration order.
pub fn build_adapters(
    configs: &[SourceConfig],
    client: reqwest::Client,
) -> Vec<Arc<dyn SourceAdapter>> {
    configs
        .iter()
        .map(|cfg| {
            let ep = Endpoint::from_config(cfg, client.clone());
            let adapter: Arc<dyn SourceAdapter> = match cfg.kind {
                ProviderKind::NewsApiOrg => Arc::new(NewsApiOrgAdapter::new(ep)),
                ProviderKind::Guardian => Arc::new(GuardianAdapter::new(ep)),
                ProviderKind::GNews => Arc::new(GNewsAdapter::new(ep)),
                ProviderKind::Nyt => Arc::new(NytAdapter::new(ep)),
                ProviderKind::Mediastack => Arc::new(MediastackAdapter::new(ep)),
                ProviderKind::NewsApiAi => Arc::new(NewsApiAiAdapter::new(ep)),
                ProviderKind::Aylien => Arc::new(AylienAdapter::new(ep)),
            };
            adapter
        })
        .collect()
}

/// Send a prepared request and decode a JSON body, mapping status codes onto `Fault`.
///
/// The request URL may carry an API key; it is never logged here.
pub(crate) async fn send_json(rb: reqwest::RequestBuilder, timeout: Duration) -> Result<Value, Fault> {
    let resp = rb.timeout(timeout).send().await?;
    let status = resp.status().as_u16();
    if let Some(fault) = Fault::from_status(status) {
        return Err(fault);
    }
    resp.json::<Value>()
        .await
        .map_err(|e| Fault::Parse(e.to_string()))
}

pub(crate) fn require_key<'a>(req: &FetchRequest<'a>) -> Result<&'a Credential, Fault> {
    req.credential.ok_or(Fault::AuthRejected)
}

/// First calendar day inside the lookback window (UTC).
pub(crate) fn from_date(lookback_days: u32) -> NaiveDate {
    (Utc::now() - ChronoDuration::days(i64::from(lookback_days))).date_naive()
}

/// Walk nested objects; `None` on any missing hop.
pub(crate) fn value_at<'v>(v: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(v, |cur, key| cur.get(key))
}

/// Non-empty string at `path`.
pub(crate) fn str_at(v: &Value, path: &[&str]) -> Option<String> {
    value_at(v, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Number at `path`, accepting numeric strings.
pub(crate) fn num_at(v: &Value, path: &[&str]) -> Option<f64> {
    match value_at(v, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Take the item array out of a provider envelope.
pub(crate) fn take_items(mut body: Value, path: &[&str]) -> Result<Vec<Value>, Fault> {
    let mut cur = &mut body;
    for key in path {
        cur = cur
            .get_mut(*key)
            .ok_or_else(|| Fault::Parse(format!("missing '{}' in envelope", path.join("."))))?;
    }
    match cur.take() {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        _ => Err(Fault::Parse(format!("'{}' is not an array", path.join(".")))),
    }
}
