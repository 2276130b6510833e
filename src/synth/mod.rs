// src/synth/mod.rs
//! Digest text generation. Exactly one strategy is configured per process.

pub mod local;
pub mod mock;
pub mod remote;

use crate::config::{SynthConfig, SynthesizerKind};
use crate::error::SynthesisError;
use crate::ingest::types::Article;
use crate::models::ModelRegistry;
use async_trait::async_trait;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::warn;

pub use local::LocalSynthesizer;
pub use mock::MockSynthesizer;
pub use remote::RemoteSynthesizer;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "synthesis_failures_total",
            "Summaries replaced by an error marker."
        );
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    /// `text` is an error marker, not a real digest.
    pub failed: bool,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_summarize(&self, articles: &[Article], query: &str)
        -> Result<String, SynthesisError>;

    /// User-facing marker shown in place of a summary.
    fn fallback_text(&self, err: &SynthesisError) -> String;

    /// Never fails: errors turn into the strategy's marker text.
    async fn summarize(&self, articles: &[Article], query: &str) -> Summary {
        ensure_metrics_described();
        match self.try_summarize(articles, query).await {
            Ok(text) => Summary {
                text,
                failed: false,
            },
            Err(e) => {
                counter!("synthesis_failures_total", "strategy" => self.name()).increment(1);
                warn!(strategy = self.name(), query, error = %e, "summary generation failed");
                Summary {
                    text: self.fallback_text(&e),
                    failed: true,
                }
            }
        }
    }
}

pub type DynSynthesizer = Arc<dyn Synthesizer>;

/// Article text for summarization: content, falling back to title.
pub(crate) fn article_text(a: &Article) -> &str {
    a.text()
}

pub fn build_synthesizer(
    cfg: &SynthConfig,
    models: Arc<ModelRegistry>,
    http: reqwest::Client,
) -> DynSynthesizer {
    match cfg.kind {
        SynthesizerKind::Remote => Arc::new(RemoteSynthesizer::new(cfg.clone(), http)),
        SynthesizerKind::Local => Arc::new(LocalSynthesizer::new(
            models,
            cfg.local_min_words,
            cfg.local_max_words,
        )),
        SynthesizerKind::Mock => Arc::new(MockSynthesizer::default()),
    }
}
