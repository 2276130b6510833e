// tests/pipeline_e2e.rs
//
// End-to-end digest runs over in-memory adapters: full success, partial
// outage, irrelevant results and total outage.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use neutral_news::config::{ProviderKind, QueryContext};
use neutral_news::ingest::types::SourceAdapter;
use neutral_news::models::ModelRegistry;
use neutral_news::pipeline::DigestPipeline;
use neutral_news::synth::MockSynthesizer;
use neutral_news::{DigestError, Fault};
use serde_json::json;

fn three_sources(
    newsapi: MockAdapter,
    guardian: MockAdapter,
    nyt: MockAdapter,
) -> Vec<(ProviderKind, Arc<dyn SourceAdapter>)> {
    vec![
        (ProviderKind::NewsApiOrg, Arc::new(newsapi) as Arc<dyn SourceAdapter>),
        (ProviderKind::Guardian, Arc::new(guardian) as Arc<dyn SourceAdapter>),
        (ProviderKind::Nyt, Arc::new(nyt) as Arc<dyn SourceAdapter>),
    ]
}

#[tokio::test]
async fn three_healthy_sources_give_a_clean_digest() {
    let p = pipeline(three_sources(
        MockAdapter::ok("newsapi", fixture(AI_FIXTURE)),
        MockAdapter::ok("guardian", fixture(AI_FIXTURE)),
        MockAdapter::ok("nyt", fixture(AI_FIXTURE)),
    ));

    let d = p.process("Artificial Intelligence", None).await.unwrap();
    assert!(!d.summary.is_empty());
    assert!(!d.summary_failed);
    assert!(!d.degraded);
    assert!(d.failed_sources.is_empty());
    assert!(d.warning.is_none());
    // identical titles across providers collapse to one each
    assert_eq!(d.articles.len(), 3);
    assert!(d
        .articles
        .windows(2)
        .all(|w| w[0].combined_score >= w[1].combined_score));
}

#[tokio::test]
async fn partial_outage_still_produces_a_digest_with_warning() {
    let slow = |name: &str| {
        MockAdapter::ok(name, fixture(AI_FIXTURE))
            .delayed(Duration::from_millis(300))
            .with_timeout(Duration::from_millis(40))
    };
    let p = pipeline(three_sources(
        slow("newsapi"),
        slow("guardian"),
        MockAdapter::ok("nyt", fixture(AI_FIXTURE)),
    ));

    let d = p.process("Artificial Intelligence", Some(3)).await.unwrap();
    assert!(!d.summary.is_empty());
    assert!(d.degraded);
    assert_eq!(d.failed_sources, ["newsapi", "guardian"]);
    assert_eq!(
        d.warning.as_deref(),
        Some("Some sources were unavailable: newsapi, guardian")
    );
    assert!(d.articles.iter().all(|a| a.provider == "nyt"));
}

#[tokio::test]
async fn nonsense_query_is_a_no_relevant_outcome() {
    let p = pipeline(three_sources(
        MockAdapter::ok("newsapi", fixture(AI_FIXTURE)),
        MockAdapter::ok("guardian", fixture(WEATHER_FIXTURE)),
        MockAdapter::ok("nyt", fixture(AI_FIXTURE)),
    ));

    let err = p.process("zxqv blorptastic", None).await.unwrap_err();
    assert!(matches!(err, DigestError::NoRelevantArticlesFound { .. }));
    assert!(err.is_empty_result());
}

#[tokio::test]
async fn total_outage_is_a_no_articles_outcome() {
    let p = pipeline(three_sources(
        MockAdapter::failing("newsapi", Fault::Timeout),
        MockAdapter::failing("guardian", Fault::AuthRejected),
        MockAdapter::failing("nyt", Fault::Status { code: 502 }),
    ));

    let err = p.process("Artificial Intelligence", None).await.unwrap_err();
    assert!(matches!(err, DigestError::NoArticlesFound { .. }));
}

#[tokio::test]
async fn matching_full_content_article_survives_with_zero_threshold() {
    let item = json!({
        "title": "Glacier melt accelerates",
        "url": "https://example.com/glacier",
        "content": "Glacier melt in the Alps accelerated this summer, scientists reported.",
        "source": "Science Now"
    });
    let p = pipeline(vec![(
        ProviderKind::Guardian,
        Arc::new(MockAdapter::ok("guardian", vec![item])) as Arc<dyn SourceAdapter>,
    )]);
    let mut ctx = QueryContext::new("glacier melt", None, p.defaults());
    ctx.relevance_threshold = 0.0;

    let d = p.process_with(&ctx).await.unwrap();
    assert_eq!(d.articles.len(), 1);
    assert_eq!(d.articles[0].source, "Science Now");
    assert!(d.articles[0].relevance_score > 0.0);
}

#[tokio::test]
async fn sentiment_is_scored_on_returned_articles() {
    let items = vec![
        json!({"title": "Markets crash on war fears", "content": "Stocks crash as war fears and crisis spread."}),
        json!({"title": "Markets rally on great earnings", "content": "Stocks rally after great profits and strong growth."}),
    ];
    let p = pipeline(vec![(
        ProviderKind::Nyt,
        Arc::new(MockAdapter::ok("nyt", items)) as Arc<dyn SourceAdapter>,
    )]);

    let d = p.process("markets stocks", None).await.unwrap();
    let crash = d.articles.iter().find(|a| a.title.contains("crash")).unwrap();
    let rally = d.articles.iter().find(|a| a.title.contains("rally")).unwrap();
    assert!(crash.sentiment_score < 0.0);
    assert!(rally.sentiment_score > 0.0);
    assert!(d.articles.iter().all(|a| (-1.0..=1.0).contains(&a.sentiment_score)));
}

#[tokio::test]
async fn synthesis_failure_keeps_articles_and_marks_summary() {
    let configs = vec![source(ProviderKind::Nyt)];
    let adapters: Vec<Arc<dyn SourceAdapter>> =
        vec![Arc::new(MockAdapter::ok("nyt", fixture(AI_FIXTURE)))];
    let (orch, _) = orchestrator(&configs, adapters, fast_settings());
    let p = DigestPipeline::new(
        orch,
        Arc::new(ModelRegistry::new()),
        Arc::new(MockSynthesizer::failing()),
        defaults(),
    );

    let d = p.process("artificial intelligence", None).await.unwrap();
    assert!(d.summary_failed);
    assert!(d.summary.starts_with("Error generating summary"));
    assert!(!d.articles.is_empty());
}
