// src/synth/remote.rs
//! OpenAI-compatible chat completion.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

use super::{article_text, Synthesizer};
use crate::config::SynthConfig;
use crate::error::SynthesisError;
use crate::ingest::types::Article;

const PREAMBLE: &str = "You are an expert in summarizing news articles neutrally. \
Your task is to generate a balanced summary from the following articles, ensuring that you \
present a fair and unbiased view.";

const INSTRUCTION: &str = "Please generate a summary that is approximately 150 words long, \
focusing on the main points and maintaining neutrality. The summary needs to be straight to \
the point and easy to read. Use simple language (B1 English).";

pub struct RemoteSynthesizer {
    cfg: SynthConfig,
    http: reqwest::Client,
}

impl RemoteSynthesizer {
    pub fn new(cfg: SynthConfig, http: reqwest::Client) -> Self {
        Self { cfg, http }
    }

    /// Numbered excerpts of `excerpt_chars` each, framed by the neutrality instruction.
    pub fn build_prompt(articles: &[Article], excerpt_chars: usize) -> String {
        let mut prompt = String::from(PREAMBLE);
        prompt.push_str("\n\n");
        for (i, a) in articles.iter().enumerate() {
            let excerpt: String = article_text(a).chars().take(excerpt_chars).collect();
            prompt.push_str(&format!("Article {}:\n{}\n\n", i + 1, excerpt));
        }
        prompt.push_str(INSTRUCTION);
        prompt.push('\n');
        prompt
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

#[async_trait]
impl Synthesizer for RemoteSynthesizer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn try_summarize(
        &self,
        articles: &[Article],
        query: &str,
    ) -> Result<String, SynthesisError> {
        if articles.is_empty() {
            return Err(SynthesisError::EmptyInput);
        }
        if self.cfg.api_key.trim().is_empty() {
            return Err(SynthesisError::NotConfigured("OPENAI_API_KEY is not set".into()));
        }

        let prompt = Self::build_prompt(articles, self.cfg.excerpt_chars);
        let body = Req {
            model: &self.cfg.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: self.cfg.temperature,
            max_tokens: self.cfg.max_tokens,
        };

        let started = Instant::now();
        let resp = self
            .http
            .post(&self.cfg.endpoint)
            .bearer_auth(&self.cfg.api_key)
            .timeout(Duration::from_millis(self.cfg.timeout_ms))
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Remote(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SynthesisError::Remote(format!("HTTP {}", status.as_u16())));
        }
        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| SynthesisError::Remote(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SynthesisError::Remote("empty completion".into()))?;

        info!(
            query,
            model = %self.cfg.model,
            prompt_chars = prompt.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "remote summary generated"
        );
        Ok(text)
    }

    fn fallback_text(&self, err: &SynthesisError) -> String {
        format!("Error generating summary: {err}")
    }
}
