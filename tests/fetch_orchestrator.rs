// tests/fetch_orchestrator.rs
//
// Fan-out behavior: partial failure, admission backoff, retries, credential
// eviction and the request deadline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use neutral_news::config::{
    Credential, FetchSettings, ProviderKind, QueryContext, QuotaLimits, RetryPolicy,
};
use neutral_news::ingest::types::SourceAdapter;
use neutral_news::Fault;

fn ctx(q: &str) -> QueryContext {
    QueryContext::new(q, None, &defaults())
}

#[tokio::test]
async fn all_sources_succeed() {
    let kinds = [ProviderKind::NewsApiOrg, ProviderKind::Guardian, ProviderKind::Nyt];
    let configs: Vec<_> = kinds.iter().map(|k| source(*k)).collect();
    let adapters: Vec<Arc<dyn SourceAdapter>> = kinds
        .iter()
        .map(|k| Arc::new(MockAdapter::ok(k.id(), fixture(AI_FIXTURE))) as Arc<dyn SourceAdapter>)
        .collect();
    let (orch, _) = orchestrator(&configs, adapters, fast_settings());

    let report = orch.fetch_all(&ctx("Artificial Intelligence")).await;
    assert!(!report.degraded);
    assert!(report.failed_sources.is_empty());
    assert_eq!(report.articles.len(), 9);
    // registration order, provider order within a source
    assert_eq!(report.articles[0].provider, "newsapi");
    assert_eq!(report.articles[3].provider, "guardian");
    assert_eq!(report.articles[0].title, "Artificial intelligence model beats benchmark");
}

#[tokio::test]
async fn timeouts_are_recorded_and_survivor_contributes() {
    let kinds = [ProviderKind::NewsApiOrg, ProviderKind::Guardian, ProviderKind::Nyt];
    let configs: Vec<_> = kinds.iter().map(|k| source(*k)).collect();
    let slow = |name: &str| {
        MockAdapter::ok(name, fixture(AI_FIXTURE))
            .delayed(Duration::from_millis(300))
            .with_timeout(Duration::from_millis(50))
    };
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(slow("newsapi")),
        Arc::new(slow("guardian")),
        Arc::new(MockAdapter::ok("nyt", fixture(AI_FIXTURE))),
    ];
    let (orch, _) = orchestrator(&configs, adapters, fast_settings());

    let report = orch.fetch_all(&ctx("Artificial Intelligence")).await;
    assert!(report.degraded);
    assert_eq!(report.failed_sources, ["newsapi", "guardian"]);
    assert_eq!(report.articles.len(), 3);
    assert!(report.articles.iter().all(|a| a.provider == "nyt"));
    let timeouts = report
        .results
        .iter()
        .filter(|r| r.fault == Some(Fault::Timeout))
        .count();
    assert_eq!(timeouts, 2);
}

#[tokio::test]
async fn every_source_failing_is_degraded_and_empty() {
    let kinds = [ProviderKind::GNews, ProviderKind::Mediastack];
    let configs: Vec<_> = kinds.iter().map(|k| source(*k)).collect();
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(MockAdapter::failing("gnews", Fault::Status { code: 500 })),
        Arc::new(MockAdapter::ok("mediastack", Vec::new())),
    ];
    let (orch, _) = orchestrator(&configs, adapters, fast_settings());

    let report = orch.fetch_all(&ctx("anything")).await;
    assert!(report.degraded);
    assert!(report.articles.is_empty());
    assert_eq!(report.failed_sources, ["gnews", "mediastack"]);
}

#[tokio::test]
async fn keyless_sources_are_skipped_not_failed() {
    let mut missing = source(ProviderKind::Aylien);
    missing.credentials.clear();
    let configs = vec![source(ProviderKind::Nyt), missing];
    let aylien = Arc::new(MockAdapter::ok("aylien", fixture(AI_FIXTURE)));
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(MockAdapter::ok("nyt", fixture(AI_FIXTURE))),
        aylien.clone() as Arc<dyn SourceAdapter>,
    ];
    let (orch, _) = orchestrator(&configs, adapters, fast_settings());

    let report = orch.fetch_all(&ctx("ai")).await;
    assert!(!report.degraded);
    assert_eq!(report.disabled_sources, ["aylien"]);
    assert_eq!(aylien.call_count(), 0);
}

#[tokio::test]
async fn denied_admission_waits_once_then_gives_up() {
    let cfg = source(ProviderKind::Nyt).with_quota(QuotaLimits::new(1, 1, 100));
    let adapter = Arc::new(MockAdapter::ok("nyt", fixture(AI_FIXTURE)));
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![adapter.clone()];
    let (orch, quota) = orchestrator(&[cfg], adapters, fast_settings());

    // consume the only minute slot
    assert!(quota.can_admit("nyt"));
    let report = orch.fetch_all(&ctx("ai")).await;
    assert_eq!(report.failed_sources, ["nyt"]);
    assert_eq!(report.results[0].fault, Some(Fault::QuotaExceeded));
    assert_eq!(adapter.call_count(), 0);
}

#[tokio::test]
async fn denied_admission_recovers_after_backoff() {
    let cfg = source(ProviderKind::Nyt).with_quota(QuotaLimits::new(1, 100, 100));
    let adapter = Arc::new(MockAdapter::ok("nyt", fixture(AI_FIXTURE)));
    let settings = FetchSettings {
        admission_backoff_ms: 1_050,
        ..fast_settings()
    };
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![adapter.clone()];
    let (orch, quota) = orchestrator(&[cfg], adapters, settings);

    // per-second window is full, frees up during the single backoff wait
    assert!(quota.can_admit("nyt"));
    let report = orch.fetch_all(&ctx("ai")).await;
    assert!(report.failed_sources.is_empty());
    assert_eq!(adapter.call_count(), 1);
}

#[tokio::test]
async fn transient_faults_are_retried_under_policy() {
    let cfg = source(ProviderKind::Guardian).with_retry(RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 5,
        multiplier: 2.0,
        max_delay_ms: 20,
    });
    let adapter = Arc::new(
        MockAdapter::ok("guardian", fixture(AI_FIXTURE))
            .then(Err(Fault::Transport("reset".into())))
            .then(Err(Fault::Status { code: 503 })),
    );
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![adapter.clone()];
    let (orch, _) = orchestrator(&[cfg], adapters, fast_settings());

    let report = orch.fetch_all(&ctx("ai")).await;
    assert!(!report.degraded);
    assert_eq!(adapter.call_count(), 3);
    assert_eq!(report.articles.len(), 3);
}

#[tokio::test]
async fn retry_denied_admission_reports_the_underlying_fault() {
    let cfg = source(ProviderKind::Guardian)
        .with_quota(QuotaLimits::new(1, 100, 100))
        .with_retry(RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 5,
            multiplier: 1.0,
            max_delay_ms: 5,
        });
    let adapter = Arc::new(
        MockAdapter::ok("guardian", fixture(AI_FIXTURE)).then(Err(Fault::Status { code: 503 })),
    );
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![adapter.clone()];
    let (orch, _) = orchestrator(&[cfg], adapters, fast_settings());

    // the retry lands in the same one-second window and is denied
    let report = orch.fetch_all(&ctx("ai")).await;
    assert_eq!(report.failed_sources, ["guardian"]);
    assert_eq!(report.results[0].fault, Some(Fault::Status { code: 503 }));
    assert_eq!(adapter.call_count(), 1);
}

#[tokio::test]
async fn rate_limited_source_is_derated_and_not_retried() {
    let cfg = source(ProviderKind::Mediastack)
        .with_quota(QuotaLimits::new(100, 40, 1_000))
        .with_retry(RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        });
    let adapter = Arc::new(MockAdapter::failing("mediastack", Fault::RateLimited));
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![adapter.clone()];
    let (orch, quota) = orchestrator(&[cfg], adapters, fast_settings());

    let report = orch.fetch_all(&ctx("ai")).await;
    assert_eq!(report.failed_sources, ["mediastack"]);
    assert_eq!(adapter.call_count(), 1);
    let limits = quota.limits("mediastack").unwrap();
    assert_eq!(limits.per_minute, 30);
    assert_eq!(limits.per_day, 750);
}

#[tokio::test]
async fn rejected_key_is_evicted_and_next_key_used() {
    let cfg = source(ProviderKind::NewsApiOrg)
        .with_credentials(vec![
            Credential::new("newsapi-1", "bad"),
            Credential::new("newsapi-2", "good"),
        ])
        .with_retry(RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            multiplier: 1.0,
            max_delay_ms: 1,
        });
    let adapter = Arc::new(
        MockAdapter::ok("newsapi", fixture(AI_FIXTURE)).then(Err(Fault::AuthRejected)),
    );
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![adapter.clone()];
    let (orch, quota) = orchestrator(&[cfg], adapters, fast_settings());

    let report = orch.fetch_all(&ctx("ai")).await;
    assert!(!report.degraded);
    assert_eq!(quota.credential_count("newsapi"), 1);
    let keys = adapter.keys_seen.lock().unwrap().clone();
    assert_eq!(keys, [Some("bad".to_string()), Some("good".to_string())]);
}

#[tokio::test]
async fn request_deadline_abandons_stragglers() {
    let configs = vec![source(ProviderKind::Nyt), source(ProviderKind::GNews)];
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(MockAdapter::ok("nyt", fixture(AI_FIXTURE))),
        Arc::new(
            MockAdapter::ok("gnews", fixture(AI_FIXTURE))
                .delayed(Duration::from_secs(2))
                .with_timeout(Duration::from_secs(5)),
        ),
    ];
    let settings = FetchSettings {
        request_deadline_ms: Some(150),
        ..fast_settings()
    };
    let (orch, _) = orchestrator(&configs, adapters, settings);

    let started = std::time::Instant::now();
    let report = orch.fetch_all(&ctx("ai")).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.failed_sources, ["gnews"]);
    assert_eq!(report.articles.len(), 3);
}
