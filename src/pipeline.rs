// src/pipeline.rs
//! fetch -> dedup -> popularity -> rank -> sentiment -> synthesis.

use crate::config::{AppConfig, QueryContext, QueryDefaults};
use crate::error::DigestError;
use crate::ingest::providers::build_adapters;
use crate::ingest::types::Article;
use crate::ingest::{dedup, FetchOrchestrator};
use crate::models::ModelRegistry;
use crate::popularity::{enrich_popularity, PopularityProbe, SharedCountProbe};
use crate::quota::QuotaManager;
use crate::relevance::{rank, RankParams};
use crate::sentiment::SentimentScorer;
use crate::synth::{build_synthesizer, DynSynthesizer};
use anyhow::{anyhow, Context};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const USER_AGENT: &str = concat!("neutral-news/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    pub query: String,
    pub summary: String,
    /// `summary` holds an error marker rather than a digest.
    pub summary_failed: bool,
    pub articles: Vec<Article>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub failed_sources: Vec<String>,
    pub degraded: bool,
}

pub fn unavailable_warning(failed: &[String]) -> Option<String> {
    (!failed.is_empty()).then(|| format!("Some sources were unavailable: {}", failed.join(", ")))
}

pub struct DigestPipeline {
    orchestrator: FetchOrchestrator,
    models: Arc<ModelRegistry>,
    synthesizer: DynSynthesizer,
    popularity: Option<(Arc<dyn PopularityProbe>, usize)>,
    defaults: QueryDefaults,
}

impl DigestPipeline {
    pub fn new(
        orchestrator: FetchOrchestrator,
        models: Arc<ModelRegistry>,
        synthesizer: DynSynthesizer,
        defaults: QueryDefaults,
    ) -> Self {
        Self {
            orchestrator,
            models,
            synthesizer,
            popularity: None,
            defaults,
        }
    }

    pub fn with_popularity(mut self, probe: Arc<dyn PopularityProbe>, concurrency: usize) -> Self {
        self.popularity = Some((probe, concurrency));
        self
    }

    /// Wire every collaborator from configuration.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .build()
            .context("building HTTP client")?;

        let quota = Arc::new(QuotaManager::new(&cfg.sources));
        let adapters = build_adapters(&cfg.sources, http.clone());
        let orchestrator = FetchOrchestrator::new(adapters, quota, cfg.fetch.clone());
        let models = Arc::new(ModelRegistry::new());
        let synthesizer = build_synthesizer(&cfg.synth, models.clone(), http.clone());

        let mut pipeline = Self::new(orchestrator, models, synthesizer, cfg.query.clone());
        if let Some(key) = &cfg.popularity.api_key {
            let probe = SharedCountProbe::new(http, &cfg.popularity.base_url, key);
            pipeline = pipeline.with_popularity(Arc::new(probe), cfg.popularity.concurrency);
        }
        Ok(pipeline)
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator {
        &self.orchestrator
    }

    pub async fn process(&self, event: &str, days_back: Option<u32>) -> Result<Digest, DigestError> {
        let ctx = QueryContext::new(event, days_back, &self.defaults);
        self.process_with(&ctx).await
    }

    pub async fn process_with(&self, ctx: &QueryContext) -> Result<Digest, DigestError> {
        let query = ctx.event.clone();
        if query.is_empty() {
            return Err(DigestError::NoArticlesFound { query });
        }

        let report = self.orchestrator.fetch_all(ctx).await;
        if report.articles.is_empty() {
            info!(query = %query, failed = ?report.failed_sources, "no articles from any source");
            return Err(DigestError::NoArticlesFound { query });
        }

        let mut articles = dedup(report.articles);
        if let Some((probe, concurrency)) = &self.popularity {
            enrich_popularity(&mut articles, probe.as_ref(), *concurrency).await;
        }

        let ranked = rank(articles, &query, &RankParams::from(ctx));
        if ranked.is_empty() {
            info!(query = %query, threshold = ctx.relevance_threshold, "nothing cleared the relevance threshold");
            return Err(DigestError::NoRelevantArticlesFound { query });
        }

        let classifier = self.models.classifier().map_err(DigestError::Internal)?;
        let scored = tokio::task::spawn_blocking(move || {
            let mut ranked = ranked;
            SentimentScorer::new(classifier).score(&mut ranked);
            ranked
        })
        .await
        .map_err(|e| {
            error!(query = %query, error = %e, "sentiment task failed");
            DigestError::Internal(anyhow!("sentiment task failed: {e}"))
        })?;

        let summary = self.synthesizer.summarize(&scored, &query).await;

        info!(
            query = %query,
            articles = scored.len(),
            degraded = report.degraded,
            summary_failed = summary.failed,
            "digest ready"
        );
        Ok(Digest {
            query,
            summary: summary.text,
            summary_failed: summary.failed,
            articles: scored,
            warning: unavailable_warning(&report.failed_sources),
            failed_sources: report.failed_sources,
            degraded: report.degraded,
        })
    }
}
