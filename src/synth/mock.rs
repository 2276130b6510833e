// src/synth/mock.rs
use async_trait::async_trait;

use super::Synthesizer;
use crate::error::SynthesisError;
use crate::ingest::types::Article;

/// Deterministic synthesizer for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct MockSynthesizer {
    fail: bool,
}

impl MockSynthesizer {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn try_summarize(
        &self,
        articles: &[Article],
        query: &str,
    ) -> Result<String, SynthesisError> {
        if self.fail {
            return Err(SynthesisError::Remote("mock failure".into()));
        }
        if articles.is_empty() {
            return Err(SynthesisError::EmptyInput);
        }
        let sources: Vec<&str> = articles.iter().map(|a| a.source.as_str()).collect();
        Ok(format!(
            "Neutral summary of {} articles about '{}' (sources: {}).",
            articles.len(),
            query,
            sources.join(", ")
        ))
    }

    fn fallback_text(&self, err: &SynthesisError) -> String {
        format!("Error generating summary: {err}")
    }
}
