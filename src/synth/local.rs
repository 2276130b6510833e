// src/synth/local.rs
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{article_text, Synthesizer};
use crate::error::SynthesisError;
use crate::ingest::types::Article;
use crate::models::{split_sentences, ModelRegistry};

/// Runs the registry's local model over the concatenated article text, one sentence per line.
pub struct LocalSynthesizer {
    models: Arc<ModelRegistry>,
    min_words: usize,
    max_words: usize,
}

impl LocalSynthesizer {
    pub fn new(models: Arc<ModelRegistry>, min_words: usize, max_words: usize) -> Self {
        Self {
            models,
            min_words,
            max_words,
        }
    }
}

#[async_trait]
impl Synthesizer for LocalSynthesizer {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn try_summarize(
        &self,
        articles: &[Article],
        query: &str,
    ) -> Result<String, SynthesisError> {
        let combined = articles
            .iter()
            .map(article_text)
            .collect::<Vec<_>>()
            .join(" ");
        if combined.trim().is_empty() {
            return Err(SynthesisError::EmptyInput);
        }

        let model = self
            .models
            .local_model()
            .map_err(|e| SynthesisError::Model(e.to_string()))?;
        let (min, max) = (self.min_words, self.max_words);
        let raw = tokio::task::spawn_blocking(move || model.summarize(&combined, min, max))
            .await
            .map_err(|e| SynthesisError::Model(format!("inference task failed: {e}")))?
            .map_err(|e| SynthesisError::Model(e.to_string()))?;

        let text = split_sentences(&raw).join("\n");
        if text.is_empty() {
            return Err(SynthesisError::Model("model produced no text".into()));
        }
        info!(query, sentences = text.lines().count(), "local summary generated");
        Ok(text)
    }

    fn fallback_text(&self, err: &SynthesisError) -> String {
        match err {
            SynthesisError::EmptyInput => "No content available for summarization.".to_string(),
            _ => "Error generating summary.".to_string(),
        }
    }
}
