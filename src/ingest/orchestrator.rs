// src/ingest/orchestrator.rs
//! Concurrent fan-out across every usable provider.
//!
//! One task per source, bounded by `max_concurrency`. A source's fault is recorded and the
//! rest of the fan-out carries on; nothing here returns an error to the caller.

use crate::config::{FetchSettings, QueryContext};
use crate::error::Fault;
use crate::ingest::ensure_metrics_described;
use crate::ingest::types::{Article, FetchRequest, SourceAdapter};
use crate::quota::QuotaManager;
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, timeout_at};
use tracing::{debug, info, warn};

/// Outcome for one provider.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub source: String,
    pub articles: Vec<Article>,
    pub fault: Option<Fault>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Merged in source registration order; provider order preserved within a source.
    pub articles: Vec<Article>,
    /// At least one source failed, or none succeeded.
    pub degraded: bool,
    pub failed_sources: Vec<String>,
    /// Skipped before dispatch: disabled, or no credential left.
    pub disabled_sources: Vec<String>,
    pub results: Vec<FetchResult>,
}

pub struct FetchOrchestrator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    quota: Arc<QuotaManager>,
    settings: FetchSettings,
}

impl FetchOrchestrator {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        quota: Arc<QuotaManager>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            adapters,
            quota,
            settings,
        }
    }

    pub fn quota(&self) -> &Arc<QuotaManager> {
        &self.quota
    }

    pub fn source_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub async fn fetch_all(&self, ctx: &QueryContext) -> FetchReport {
        ensure_metrics_described();

        let mut report = FetchReport::default();
        let mut active = Vec::new();
        for adapter in &self.adapters {
            if self.quota.is_enabled(adapter.name()) {
                active.push(adapter.clone());
            } else {
                debug!(source = adapter.name(), "source disabled; skipped");
                report.disabled_sources.push(adapter.name().to_string());
            }
        }

        if active.is_empty() {
            warn!(query = %ctx.event, "no usable sources configured");
            report.degraded = true;
            return report;
        }

        let deadline = self
            .settings
            .request_deadline()
            .map(|d| tokio::time::Instant::now() + d);
        let workers = self.settings.max_concurrency.max(1);

        let tasks: Vec<_> = active.into_iter().map(|adapter| {
            let quota = self.quota.clone();
            let settings = self.settings.clone();
            let ctx = ctx.clone();
            let name = adapter.name().to_string();
            async move {
                let mut handle = tokio::spawn(async move {
                    fetch_one(adapter.as_ref(), &quota, &settings, &ctx).await
                });
                let joined = match deadline {
                    Some(at) => match timeout_at(at, &mut handle).await {
                        Ok(j) => j,
                        Err(_) => {
                            handle.abort();
                            warn!(source = %name, "request deadline reached; source abandoned");
                            return FetchResult {
                                source: name,
                                articles: Vec::new(),
                                fault: Some(Fault::Timeout),
                            };
                        }
                    },
                    None => handle.await,
                };
                joined.unwrap_or_else(|e| {
                    warn!(source = %name, error = %e, "fetch task aborted");
                    FetchResult {
                        source: name,
                        articles: Vec::new(),
                        fault: Some(Fault::Transport(format!("task failed: {e}"))),
                    }
                })
            }
        }).collect();

        let results: Vec<FetchResult> = stream::iter(tasks).buffered(workers).collect().await;

        let mut succeeded = 0usize;
        for r in &results {
            match &r.fault {
                None => {
                    succeeded += 1;
                    report.articles.extend(r.articles.iter().cloned());
                }
                Some(fault) => {
                    counter!(
                        "fetch_source_errors_total",
                        "source" => r.source.clone(),
                        "kind" => fault.kind()
                    )
                    .increment(1);
                    report.failed_sources.push(r.source.clone());
                }
            }
        }
        report.degraded = !report.failed_sources.is_empty() || succeeded == 0;
        report.results = results;

        info!(
            query = %ctx.event,
            articles = report.articles.len(),
            succeeded,
            failed = ?report.failed_sources,
            degraded = report.degraded,
            "fetch fan-out finished"
        );
        report
    }
}

/// Admission with one bounded backoff: try, wait once, try again, then give up.
async fn admit(quota: &QuotaManager, source: &str, settings: &FetchSettings) -> bool {
    if quota.can_admit(source) {
        return true;
    }
    debug!(source, backoff_ms = settings.admission_backoff_ms, "admission denied; backing off");
    sleep(settings.admission_backoff()).await;
    quota.can_admit(source)
}

async fn fetch_one(
    adapter: &dyn SourceAdapter,
    quota: &QuotaManager,
    settings: &FetchSettings,
    ctx: &QueryContext,
) -> FetchResult {
    let source = adapter.name().to_string();
    let started = Instant::now();
    let outcome = fetch_with_retry(adapter, quota, settings, ctx).await;
    histogram!("fetch_source_ms", "source" => source.clone())
        .record(started.elapsed().as_secs_f64() * 1000.0);

    match outcome {
        Ok(articles) => {
            debug!(source = %source, count = articles.len(), "source ok");
            FetchResult {
                source,
                articles,
                fault: None,
            }
        }
        Err(fault) => {
            warn!(source = %source, error = %fault, "source failed");
            FetchResult {
                source,
                articles: Vec::new(),
                fault: Some(fault),
            }
        }
    }
}

async fn fetch_with_retry(
    adapter: &dyn SourceAdapter,
    quota: &QuotaManager,
    settings: &FetchSettings,
    ctx: &QueryContext,
) -> Result<Vec<Article>, Fault> {
    let source = adapter.name();
    let policy = quota.retry_policy(source);
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    let mut last_fault: Option<Fault> = None;

    loop {
        attempt += 1;
        if !admit(quota, source, settings).await {
            // a denied retry reports the fault that caused it
            return Err(last_fault.unwrap_or(Fault::QuotaExceeded));
        }

        let credential = quota.select_credential(source);
        if credential.is_none() && quota.requires_key(source) {
            return Err(Fault::AuthRejected);
        }
        let req = FetchRequest {
            query: &ctx.event,
            lookback_days: ctx.lookback_days,
            max_results: ctx.max_per_source,
            credential: credential.as_ref(),
        };

        counter!("fetch_requests_total", "source" => source.to_string()).increment(1);
        let fault = match timeout(adapter.timeout(), adapter.fetch(&req)).await {
            Ok(Ok(raw)) => {
                let articles: Vec<Article> = raw
                    .into_iter()
                    .filter_map(|item| adapter.normalize(item))
                    .take(ctx.max_per_source)
                    .collect();
                return if articles.is_empty() {
                    Err(Fault::Empty)
                } else {
                    Ok(articles)
                };
            }
            Ok(Err(f)) => f,
            Err(_) => Fault::Timeout,
        };

        match &fault {
            Fault::RateLimited => {
                quota.on_rate_limited(source);
                return Err(fault);
            }
            Fault::AuthRejected => {
                if let Some(c) = &credential {
                    quota.on_auth_failed(source, &c.id);
                }
                if attempt >= max_attempts || !quota.is_enabled(source) {
                    return Err(fault);
                }
            }
            f if f.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                debug!(source, attempt, delay_ms = delay.as_millis() as u64, error = %f, "retrying");
                sleep(delay).await;
            }
            _ => return Err(fault),
        }
        last_fault = Some(fault);
    }
}
