// src/config/mod.rs
//! Application configuration: built once at startup and passed down explicitly.
//!
//! Resolution order:
//! 1) profile defaults (`APP_ENV` = development | production | testing)
//! 2) optional TOML file (`$DIGEST_CONFIG_PATH`, else `config/digest.toml` if present)
//! 3) environment overrides (provider keys, tuning knobs, synthesizer selection)

pub mod sources;
pub mod synth;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub use sources::{Credential, ProviderKind, QuotaLimits, RetryPolicy, SourceConfig};
pub use synth::{SynthConfig, SynthesizerKind};

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Production,
    Testing,
}

impl Profile {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or_default().trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Profile::Production,
            "testing" | "test" => Profile::Testing,
            _ => Profile::Development,
        }
    }
}

/// Per-request knobs; the caller may override the lookback only.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDefaults {
    pub lookback_days: u32,
    pub max_articles_per_source: usize,
    pub top_n: usize,
    pub relevance_threshold: f32,
    pub weight_relevance: f32,
    pub weight_popularity: f32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            max_articles_per_source: 10,
            top_n: 20,
            relevance_threshold: 0.05,
            weight_relevance: 0.7,
            weight_popularity: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Upper bound on concurrently running provider calls.
    pub max_concurrency: usize,
    /// Single wait before the second (and last) admission attempt.
    pub admission_backoff_ms: u64,
    /// Bound on the whole fan-out; `None` waits for every source's own timeout.
    pub request_deadline_ms: Option<u64>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 7,
            admission_backoff_ms: 1_000,
            request_deadline_ms: Some(15_000),
        }
    }
}

impl FetchSettings {
    pub fn admission_backoff(&self) -> Duration {
        Duration::from_millis(self.admission_backoff_ms)
    }

    pub fn request_deadline(&self) -> Option<Duration> {
        self.request_deadline_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopularitySettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub concurrency: usize,
}

impl Default for PopularitySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.sharedcount.com/v1.1".to_string(),
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profile: Profile,
    pub query: QueryDefaults,
    pub fetch: FetchSettings,
    pub cache_ttl_secs: u64,
    pub sources: Vec<SourceConfig>,
    pub synth: SynthConfig,
    pub popularity: PopularitySettings,
}

/// Resolved inputs for one `process()` call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryContext {
    pub event: String,
    pub lookback_days: u32,
    pub max_per_source: usize,
    pub top_n: usize,
    pub relevance_threshold: f32,
    pub weight_relevance: f32,
    pub weight_popularity: f32,
}

impl QueryContext {
    pub fn new(event: impl Into<String>, days_back: Option<u32>, d: &QueryDefaults) -> Self {
        Self {
            event: event.into().trim().to_string(),
            lookback_days: days_back.filter(|d| *d > 0).unwrap_or(d.lookback_days),
            max_per_source: d.max_articles_per_source,
            top_n: d.top_n,
            relevance_threshold: d.relevance_threshold,
            weight_relevance: d.weight_relevance,
            weight_popularity: d.weight_popularity,
        }
    }
}

/* ----------------------------
TOML file schema (all optional)
---------------------------- */

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    query: QueryOverrides,
    #[serde(default)]
    fetch: FetchOverrides,
    #[serde(default)]
    cache: CacheOverrides,
    #[serde(default)]
    synth: Option<SynthConfig>,
    #[serde(default)]
    sources: HashMap<String, SourceOverrides>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryOverrides {
    lookback_days: Option<u32>,
    max_articles_per_source: Option<usize>,
    top_n: Option<usize>,
    relevance_threshold: Option<f32>,
    weight_relevance: Option<f32>,
    weight_popularity: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct FetchOverrides {
    max_concurrency: Option<usize>,
    admission_backoff_ms: Option<u64>,
    request_deadline_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheOverrides {
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceOverrides {
    enabled: Option<bool>,
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    quota: Option<QuotaLimits>,
    retry: Option<RetryPolicy>,
}

impl AppConfig {
    /// Defaults for a profile, with every provider present but keyless.
    pub fn for_profile(profile: Profile) -> Self {
        let mut query = QueryDefaults::default();
        let mut cache_ttl_secs = 1_800;
        match profile {
            Profile::Production => {
                query.max_articles_per_source = 4;
                query.top_n = 7;
                query.weight_relevance = 0.8;
                query.weight_popularity = 0.2;
            }
            Profile::Testing => cache_ttl_secs = 60,
            Profile::Development => cache_ttl_secs = 300,
        }
        Self {
            profile,
            query,
            fetch: FetchSettings::default(),
            cache_ttl_secs,
            sources: ProviderKind::ALL.into_iter().map(SourceConfig::new).collect(),
            synth: SynthConfig::default(),
            popularity: PopularitySettings::default(),
        }
    }

    /// Load from the process environment (and optional TOML file).
    pub fn load() -> Result<Self> {
        let lookup = |k: &str| std::env::var(k).ok();
        Self::load_with(&lookup)
    }

    /// Same as `load`, with an injectable variable lookup.
    pub fn load_with(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let profile = Profile::parse(lookup("APP_ENV").as_deref());
        let mut cfg = Self::for_profile(profile);

        let path = match lookup(ENV_CONFIG_PATH) {
            Some(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Some(pb)
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        };
        if let Some(path) = path {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading digest config from {}", path.display()))?;
            cfg.apply_toml(&content)
                .with_context(|| format!("parsing digest config {}", path.display()))?;
        }

        cfg.apply_env(lookup)?;
        cfg.sanitize();

        let usable: Vec<&str> = cfg
            .sources
            .iter()
            .filter(|s| s.is_usable())
            .map(|s| s.name())
            .collect();
        info!(profile = ?cfg.profile, sources = ?usable, synth = ?cfg.synth.kind, "config loaded");
        Ok(cfg)
    }

    /// Overlay a TOML document onto the current values.
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(content)?;

        let q = file.query;
        if let Some(v) = q.lookback_days {
            self.query.lookback_days = v;
        }
        if let Some(v) = q.max_articles_per_source {
            self.query.max_articles_per_source = v;
        }
        if let Some(v) = q.top_n {
            self.query.top_n = v;
        }
        if let Some(v) = q.relevance_threshold {
            self.query.relevance_threshold = v;
        }
        if let Some(v) = q.weight_relevance {
            self.query.weight_relevance = v;
        }
        if let Some(v) = q.weight_popularity {
            self.query.weight_popularity = v;
        }

        if let Some(v) = file.fetch.max_concurrency {
            self.fetch.max_concurrency = v;
        }
        if let Some(v) = file.fetch.admission_backoff_ms {
            self.fetch.admission_backoff_ms = v;
        }
        if let Some(v) = file.fetch.request_deadline_ms {
            // 0 disables the end-to-end deadline
            self.fetch.request_deadline_ms = (v > 0).then_some(v);
        }
        if let Some(v) = file.cache.ttl_secs {
            self.cache_ttl_secs = v;
        }
        if let Some(s) = file.synth {
            self.synth = s;
        }

        for (id, o) in file.sources {
            let Some(kind) = ProviderKind::from_id(&id) else {
                warn!(source = %id, "unknown source in config file; ignored");
                continue;
            };
            let Some(src) = self.sources.iter_mut().find(|s| s.kind == kind) else {
                continue;
            };
            if let Some(v) = o.enabled {
                src.enabled = v;
            }
            if let Some(v) = o.base_url {
                src.base_url = v;
            }
            if let Some(v) = o.timeout_ms {
                src.timeout_ms = v;
            }
            if let Some(v) = o.quota {
                src.quota = v;
            }
            if let Some(v) = o.retry {
                src.retry = v;
            }
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        fn parsed<T: std::str::FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            let raw = lookup(key)?;
            match raw.trim().parse::<T>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, "ignoring unparsable env override");
                    None
                }
            }
        }

        if let Some(v) = parsed(lookup, "DEFAULT_DAYS_BACK") {
            self.query.lookback_days = v;
        }
        if let Some(v) = parsed(lookup, "MAX_ARTICLES_PER_API") {
            self.query.max_articles_per_source = v;
        }
        if let Some(v) = parsed(lookup, "DEFAULT_TOP_N") {
            self.query.top_n = v;
        }
        if let Some(v) = parsed(lookup, "RELEVANCE_THRESHOLD") {
            self.query.relevance_threshold = v;
        }
        if let Some(v) = parsed(lookup, "WEIGHT_RELEVANCE") {
            self.query.weight_relevance = v;
        }
        if let Some(v) = parsed(lookup, "WEIGHT_POPULARITY") {
            self.query.weight_popularity = v;
        }
        if let Some(v) = parsed(lookup, "CACHE_TTL_SECS") {
            self.cache_ttl_secs = v;
        }

        for src in self.sources.iter_mut() {
            if let Some(raw) = lookup(src.kind.key_env()) {
                let mut creds = Credential::list_from_env_value(src.name(), &raw);
                if src.kind == ProviderKind::Aylien {
                    // Aylien authenticates with an application id + key pair.
                    match lookup("AYLIEN_APP_ID").filter(|s| !s.trim().is_empty()) {
                        Some(app_id) => {
                            creds = creds
                                .into_iter()
                                .map(|c| c.with_app_id(app_id.trim()))
                                .collect();
                        }
                        None => creds.clear(),
                    }
                }
                src.credentials = creds;
            }
        }

        if let Some(raw) = lookup("SYNTHESIZER").or_else(|| lookup("SUMMARIZER_BY_GPT")) {
            self.synth.kind = SynthesizerKind::parse(&raw)?;
        }
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.synth.model = model;
        }
        self.synth = std::mem::take(&mut self.synth).resolve(lookup);

        if let Some(key) = lookup("SHAREDCOUNT_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.popularity.api_key = Some(key);
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        let q = &mut self.query;
        q.relevance_threshold = if q.relevance_threshold.is_finite() {
            q.relevance_threshold.clamp(0.0, 1.0)
        } else {
            QueryDefaults::default().relevance_threshold
        };
        if !(q.weight_relevance >= 0.0) {
            q.weight_relevance = QueryDefaults::default().weight_relevance;
        }
        if !(q.weight_popularity >= 0.0) {
            q.weight_popularity = QueryDefaults::default().weight_popularity;
        }
        q.top_n = q.top_n.max(1);
        q.max_articles_per_source = q.max_articles_per_source.max(1);
        q.lookback_days = q.lookback_days.max(1);
        self.fetch.max_concurrency = self.fetch.max_concurrency.clamp(1, 32);
        self.popularity.concurrency = self.popularity.concurrency.max(1);
    }
}
