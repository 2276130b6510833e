// src/config/synth.rs
use anyhow::bail;
use serde::{Deserialize, Serialize};

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_max_tokens() -> u32 {
    150
}
fn default_temperature() -> f32 {
    0.2
}
fn default_excerpt_chars() -> usize {
    150
}
fn default_timeout_ms() -> u64 {
    20_000
}
fn default_min_words() -> usize {
    100
}
fn default_max_words() -> usize {
    300
}

/// Which summarization strategy the pipeline uses. Exactly one per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesizerKind {
    Remote,
    Local,
    Mock,
}

impl SynthesizerKind {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" | "gpt" | "openai" | "1" => Ok(Self::Remote),
            "local" | "bart" | "0" => Ok(Self::Local),
            "mock" => Ok(Self::Mock),
            other => bail!("Unsupported synthesizer in config: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    pub kind: SynthesizerKind,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Characters of each article handed to the remote prompt.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_min_words")]
    pub local_min_words: usize,
    #[serde(default = "default_max_words")]
    pub local_max_words: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            kind: SynthesizerKind::Remote,
            api_key: String::new(),
            model: default_model(),
            endpoint: default_endpoint(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            excerpt_chars: default_excerpt_chars(),
            timeout_ms: default_timeout_ms(),
            local_min_words: default_min_words(),
            local_max_words: default_max_words(),
        }
    }
}

impl SynthConfig {
    /// Resolve the "ENV" key placeholder and sanitize numeric bounds.
    pub fn resolve(mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        if self.api_key.trim().eq_ignore_ascii_case("env") || self.api_key.trim().is_empty() {
            self.api_key = lookup("OPENAI_API_KEY").unwrap_or_default();
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.local_min_words > self.local_max_words {
            // swap to keep a valid interval
            std::mem::swap(&mut self.local_min_words, &mut self.local_max_words);
        }
        if self.excerpt_chars == 0 {
            self.excerpt_chars = default_excerpt_chars();
        }
        self
    }
}
