// src/config/sources.rs
//! Per-provider configuration: endpoint, credentials, quota windows and retry policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Mandatory bound on a single provider call.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

/// The external news services we know how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    NewsApiOrg,
    Guardian,
    GNews,
    Nyt,
    Mediastack,
    NewsApiAi,
    Aylien,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::NewsApiOrg,
        ProviderKind::Guardian,
        ProviderKind::Aylien,
        ProviderKind::GNews,
        ProviderKind::Nyt,
        ProviderKind::Mediastack,
        ProviderKind::NewsApiAi,
    ];

    /// Stable provider id; keys the quota manager and shows up in `failed_sources`.
    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::NewsApiOrg => "newsapi",
            ProviderKind::Guardian => "guardian",
            ProviderKind::GNews => "gnews",
            ProviderKind::Nyt => "nyt",
            ProviderKind::Mediastack => "mediastack",
            ProviderKind::NewsApiAi => "newsapi_ai",
            ProviderKind::Aylien => "aylien",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id().eq_ignore_ascii_case(id))
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::NewsApiOrg => "https://newsapi.org/v2",
            ProviderKind::Guardian => "https://content.guardianapis.com",
            ProviderKind::GNews => "https://gnews.io/api/v4",
            ProviderKind::Nyt => "https://api.nytimes.com/svc",
            ProviderKind::Mediastack => "http://api.mediastack.com/v1",
            ProviderKind::NewsApiAi => "https://newsapi.ai/api/v1",
            ProviderKind::Aylien => "https://api.aylien.com/news",
        }
    }

    /// Env var holding a comma-separated list of keys for rotation.
    pub fn key_env(self) -> &'static str {
        match self {
            ProviderKind::NewsApiOrg => "NEWSAPI_ORG_KEY",
            ProviderKind::Guardian => "GUARDIAN_API_KEY",
            ProviderKind::GNews => "GNEWS_API_KEY",
            ProviderKind::Nyt => "NYT_API_KEY",
            ProviderKind::Mediastack => "MEDIASTACK_API_KEY",
            ProviderKind::NewsApiAi => "NEWSAPI_AI_KEY",
            ProviderKind::Aylien => "AYLIEN_API_KEY",
        }
    }

    /// Published free-tier limits; unknown providers get a conservative default.
    pub fn default_quota(self) -> QuotaLimits {
        match self {
            ProviderKind::NewsApiOrg => QuotaLimits::new(1, 30, 1_000),
            ProviderKind::Nyt => QuotaLimits::new(1, 30, 4_000),
            ProviderKind::Mediastack => QuotaLimits::new(1, 60, 1_000),
            ProviderKind::GNews => QuotaLimits::new(1, 60, 1_000),
            ProviderKind::Guardian => QuotaLimits::new(1, 30, 500),
            ProviderKind::NewsApiAi | ProviderKind::Aylien => QuotaLimits::new(1, 30, 1_000),
        }
    }
}

/// A single API credential. Aylien needs an application id next to the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub app_id: Option<String>,
}

impl Credential {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            app_id: None,
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Split a comma-separated env value into credentials named `<provider>-<n>`.
    pub fn list_from_env_value(provider: &str, raw: &str) -> Vec<Credential> {
        raw.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .enumerate()
            .map(|(i, k)| Credential::new(format!("{provider}-{}", i + 1), k))
            .collect()
    }
}

// Never print secrets; id + length only.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("key_len", &self.key.len())
            .field("has_app_id", &self.app_id.is_some())
            .finish()
    }
}

/// Requests allowed per 1s / 60s / 86400s window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub per_second: u32,
    pub per_minute: u32,
    pub per_day: u32,
}

impl QuotaLimits {
    pub const fn new(per_second: u32, per_minute: u32, per_day: u32) -> Self {
        Self {
            per_second,
            per_minute,
            per_day,
        }
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self::new(1, 30, 1_000)
    }
}

/// Exponential backoff applied by the orchestrator around each adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. 1 disables retries.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 250,
            multiplier: 2.0,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as i32;
        let raw = self.base_delay_ms as f64 * self.multiplier.max(1.0).powi(exp);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Resolved configuration for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    /// Ordered; the quota manager rotates through them.
    pub credentials: Vec<Credential>,
    pub requires_key: bool,
    pub quota: QuotaLimits,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
    pub enabled: bool,
}

impl SourceConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            base_url: kind.default_base_url().to_string(),
            credentials: Vec::new(),
            requires_key: true,
            quota: kind.default_quota(),
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            enabled: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.id()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    pub fn with_credentials(mut self, creds: Vec<Credential>) -> Self {
        self.credentials = creds;
        self
    }

    pub fn with_quota(mut self, quota: QuotaLimits) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enabled and, if a key is required, at least one credential present.
    pub fn is_usable(&self) -> bool {
        self.enabled && (!self.requires_key || !self.credentials.is_empty())
    }
}
