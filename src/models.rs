// src/models.rs
//! Process-wide inference models, owned by the application context.
//!
//! Each model is built lazily on first use behind a `OnceCell`; concurrent first callers
//! block on the same initializer, so a model is never constructed twice.

use crate::sentiment::{Classifier, LexiconClassifier};
use anyhow::{bail, Result};
use once_cell::sync::OnceCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Local abstractive/extractive summarizer. Blocking; callers move it off the runtime.
pub trait SummarizationModel: Send + Sync {
    fn name(&self) -> &'static str;
    fn summarize(&self, text: &str, min_words: usize, max_words: usize) -> Result<String>;
}

#[derive(Default)]
pub struct ModelRegistry {
    classifier: OnceCell<Arc<dyn Classifier>>,
    local_model: OnceCell<Arc<dyn SummarizationModel>>,
    builds: AtomicUsize,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a classifier (tests, alternative backends).
    pub fn with_classifier(self, c: Arc<dyn Classifier>) -> Self {
        let _ = self.classifier.set(c);
        self
    }

    pub fn with_local_model(self, m: Arc<dyn SummarizationModel>) -> Self {
        let _ = self.local_model.set(m);
        self
    }

    pub fn classifier(&self) -> Result<Arc<dyn Classifier>> {
        self.classifier
            .get_or_try_init(|| {
                self.builds.fetch_add(1, Ordering::SeqCst);
                let c: Arc<dyn Classifier> = Arc::new(LexiconClassifier::new());
                info!(model = c.name(), "sentiment classifier loaded");
                Ok(c)
            })
            .cloned()
    }

    pub fn local_model(&self) -> Result<Arc<dyn SummarizationModel>> {
        self.local_model
            .get_or_try_init(|| {
                self.builds.fetch_add(1, Ordering::SeqCst);
                let m: Arc<dyn SummarizationModel> = Arc::new(FrequencySummarizer::default());
                info!(model = m.name(), "local summarization model loaded");
                Ok(m)
            })
            .cloned()
    }

    /// Number of lazy constructions performed so far.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

/// Split after `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = text.trim().chars().peekable();
    while let Some(c) = chars.next() {
        cur.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            let s = cur.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
            cur.clear();
        }
    }
    let tail = cur.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "of", "to", "in", "on", "at", "for", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "it", "its", "as", "that", "this", "has",
    "have", "had", "he", "she", "they", "their", "his", "her", "will", "would", "said", "says",
    "not", "which", "who", "after", "over", "into", "than", "also",
];

/// Extractive summarizer: picks the sentences whose words are most frequent in the input,
/// then restores original order.
#[derive(Debug, Default, Clone)]
pub struct FrequencySummarizer;

impl FrequencySummarizer {
    fn words(s: &str) -> impl Iterator<Item = String> + '_ {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
    }
}

impl SummarizationModel for FrequencySummarizer {
    fn name(&self) -> &'static str {
        "frequency"
    }

    fn summarize(&self, text: &str, min_words: usize, max_words: usize) -> Result<String> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            bail!("no sentences in input");
        }

        let stop: HashSet<&str> = STOPWORDS.iter().copied().collect();
        let mut freq: HashMap<String, f64> = HashMap::new();
        for w in Self::words(text).filter(|w| !stop.contains(w.as_str())) {
            *freq.entry(w).or_insert(0.0) += 1.0;
        }
        let top = freq.values().copied().fold(0.0_f64, f64::max).max(1.0);

        let mut scored: Vec<(usize, f64, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let words: Vec<String> = Self::words(s).collect();
                let score: f64 = words
                    .iter()
                    .filter_map(|w| freq.get(w))
                    .map(|f| f / top)
                    .sum::<f64>()
                    / (words.len().max(1) as f64);
                (i, score, words.len())
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut picked: Vec<usize> = Vec::new();
        let mut total = 0usize;
        for (i, _, n) in scored {
            if total >= min_words {
                break;
            }
            if total > 0 && total + n > max_words {
                continue;
            }
            picked.push(i);
            total += n;
        }
        picked.sort_unstable();

        Ok(picked
            .into_iter()
            .map(|i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}
