// tests/common/mod.rs
//
// Shared helpers for integration tests: a scriptable in-memory adapter and
// builders for quota/orchestrator/pipeline wiring without network access.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use neutral_news::config::{
    Credential, FetchSettings, ProviderKind, QueryDefaults, QuotaLimits, RetryPolicy, SourceConfig,
};
use neutral_news::ingest::types::{Article, FetchRequest, RawItem, SourceAdapter};
use neutral_news::ingest::{make_article, ArticleFields, FetchOrchestrator};
use neutral_news::models::ModelRegistry;
use neutral_news::pipeline::DigestPipeline;
use neutral_news::quota::QuotaManager;
use neutral_news::synth::MockSynthesizer;
use neutral_news::Fault;

pub const AI_FIXTURE: &str = include_str!("../fixtures/articles_ai.json");
pub const WEATHER_FIXTURE: &str = include_str!("../fixtures/articles_weather.json");

pub fn fixture(raw: &str) -> Vec<Value> {
    serde_json::from_str(raw).expect("fixture json")
}

/// Adapter that replays scripted outcomes, then falls back to a fixed one.
pub struct MockAdapter {
    name: String,
    script: Mutex<VecDeque<Result<Vec<Value>, Fault>>>,
    fallback: Result<Vec<Value>, Fault>,
    delay: Duration,
    timeout: Duration,
    pub calls: AtomicUsize,
    pub keys_seen: Mutex<Vec<Option<String>>>,
}

impl MockAdapter {
    pub fn ok(name: &str, items: Vec<Value>) -> Self {
        Self::with_fallback(name, Ok(items))
    }

    pub fn failing(name: &str, fault: Fault) -> Self {
        Self::with_fallback(name, Err(fault))
    }

    fn with_fallback(name: &str, fallback: Result<Vec<Value>, Fault>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            timeout: Duration::from_millis(500),
            calls: AtomicUsize::new(0),
            keys_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, outcome: Result<Vec<Value>, Fault>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<Vec<RawItem>, Fault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys_seen
            .lock()
            .unwrap()
            .push(req.credential.map(|c| c.key.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn normalize(&self, raw: RawItem) -> Option<Article> {
        let s = |k: &str| raw.get(k).and_then(Value::as_str).map(str::to_string);
        make_article(
            &self.name,
            "Mock",
            ArticleFields {
                title: s("title"),
                url: s("url"),
                content: vec![s("content")],
                source: s("source"),
                published: None,
                popularity: raw.get("shares").and_then(Value::as_f64),
            },
        )
    }
}

/// Source config with generous limits, one key and no retries.
pub fn source(kind: ProviderKind) -> SourceConfig {
    SourceConfig::new(kind)
        .with_credentials(vec![Credential::new(format!("{}-1", kind.id()), "test-key")])
        .with_quota(QuotaLimits::new(100, 1_000, 10_000))
        .with_retry(RetryPolicy::no_retry())
}

pub fn fast_settings() -> FetchSettings {
    FetchSettings {
        max_concurrency: 7,
        admission_backoff_ms: 20,
        request_deadline_ms: Some(2_000),
    }
}

pub fn orchestrator(
    configs: &[SourceConfig],
    adapters: Vec<Arc<dyn SourceAdapter>>,
    settings: FetchSettings,
) -> (FetchOrchestrator, Arc<QuotaManager>) {
    let quota = Arc::new(QuotaManager::new(configs));
    (
        FetchOrchestrator::new(adapters, quota.clone(), settings),
        quota,
    )
}

pub fn defaults() -> QueryDefaults {
    QueryDefaults {
        lookback_days: 7,
        max_articles_per_source: 10,
        top_n: 20,
        relevance_threshold: 0.05,
        weight_relevance: 0.7,
        weight_popularity: 0.3,
    }
}

/// Pipeline over the given mock adapters with the mock synthesizer.
pub fn pipeline(adapters: Vec<(ProviderKind, Arc<dyn SourceAdapter>)>) -> DigestPipeline {
    let configs: Vec<SourceConfig> = adapters.iter().map(|(k, _)| source(*k)).collect();
    let adapters = adapters.into_iter().map(|(_, a)| a).collect();
    let (orch, _) = orchestrator(&configs, adapters, fast_settings());
    DigestPipeline::new(
        orch,
        Arc::new(ModelRegistry::new()),
        Arc::new(MockSynthesizer::default()),
        defaults(),
    )
}
