// src/sentiment.rs
//! Batched sentiment scoring.
//!
//! Titles and contents of the whole candidate set go to the classifier as two batches.
//! Each span yields a signed confidence; an article scores `0.3 * title + 0.7 * content`.

use crate::ingest::types::Article;
use metrics::{counter, describe_counter};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Characters of title and content handed to the classifier.
pub const SPAN_CHARS: usize = 200;
pub const TITLE_WEIGHT: f32 = 0.3;
pub const CONTENT_WEIGHT: f32 = 0.7;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).unwrap_or_else(|e| {
        warn!(error = %e, "sentiment lexicon unreadable; scoring everything neutral");
        HashMap::new()
    })
});

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "sentiment_failures_total",
            "Classifier batches that failed and defaulted to 0."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: Polarity,
    /// In [0, 1].
    pub confidence: f32,
}

impl Classification {
    /// Confidence, negated for a negative label.
    pub fn signed(&self) -> f32 {
        let c = self.confidence.clamp(0.0, 1.0);
        match self.label {
            Polarity::Positive => c,
            Polarity::Negative => -c,
        }
    }
}

/// Binary positive/negative classifier. One call per batch; output order matches input.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Classification>>;
}

/// Word-list classifier with a short negation window.
#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count). A negator in the previous 1..=3 tokens flips a word.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    pub fn classify(&self, text: &str) -> Classification {
        let (score, _) = self.score_text(text);
        let label = if score < 0 {
            Polarity::Negative
        } else {
            Polarity::Positive
        };
        Classification {
            label,
            confidence: (score.unsigned_abs() as f32 / 2.0).tanh(),
        }
    }
}

impl Classifier for LexiconClassifier {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn classify_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Classification>> {
        Ok(texts.iter().map(|t| self.classify(t)).collect())
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "without"
            | "didn't"
            | "doesn't"
    )
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub struct SentimentScorer {
    classifier: Arc<dyn Classifier>,
}

impl SentimentScorer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Fill `sentiment_score` in place. Classifier failure leaves the affected half at 0.
    pub fn score(&self, articles: &mut [Article]) {
        ensure_metrics_described();
        if articles.is_empty() {
            return;
        }

        let titles: Vec<String> = articles
            .iter()
            .map(|a| truncate_chars(&a.title, SPAN_CHARS))
            .collect();
        let contents: Vec<String> = articles
            .iter()
            .map(|a| truncate_chars(&a.content, SPAN_CHARS))
            .collect();

        let title_scores = self.run_batch("title", &titles);
        let content_scores = self.run_batch("content", &contents);

        for (i, a) in articles.iter_mut().enumerate() {
            let s = TITLE_WEIGHT * title_scores[i] + CONTENT_WEIGHT * content_scores[i];
            a.sentiment_score = s.clamp(-1.0, 1.0);
        }
        debug!(
            classifier = self.classifier.name(),
            scored = articles.len(),
            "sentiment scored"
        );
    }

    fn run_batch(&self, span: &'static str, texts: &[String]) -> Vec<f32> {
        match self.classifier.classify_batch(texts) {
            Ok(out) if out.len() == texts.len() => out.iter().map(Classification::signed).collect(),
            Ok(out) => {
                counter!("sentiment_failures_total", "span" => span).increment(1);
                warn!(
                    span,
                    expected = texts.len(),
                    got = out.len(),
                    "classifier returned wrong batch size; defaulting to 0"
                );
                vec![0.0; texts.len()]
            }
            Err(e) => {
                counter!("sentiment_failures_total", "span" => span).increment(1);
                warn!(span, error = ?e, "sentiment batch failed; defaulting to 0");
                vec![0.0; texts.len()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn art(title: &str, content: &str) -> Article {
        Article {
            title: title.into(),
            url: "#".into(),
            content: content.into(),
            source: "s".into(),
            provider: "p".into(),
            published_at: None,
            popularity_signal: None,
            sentiment_score: 0.0,
            relevance_score: 0.0,
            combined_score: 0.0,
        }
    }

    #[test]
    fn lexicon_polarity_and_negation() {
        let c = LexiconClassifier::new();
        assert!(c.classify("a great success for the team").signed() > 0.5);
        assert!(c.classify("markets crash as crisis deepens").signed() < -0.5);
        assert!(c.classify("this is not good").signed() < 0.0);
        assert_eq!(c.classify("the committee met on tuesday").signed(), 0.0);
    }

    struct Counting {
        calls: AtomicUsize,
        fixed: Classification,
    }

    impl Classifier for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn classify_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Classification>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(texts.iter().all(|t| t.chars().count() <= SPAN_CHARS));
            Ok(vec![self.fixed; texts.len()])
        }
    }

    #[test]
    fn two_batched_calls_and_weighted_blend() {
        let clf = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fixed: Classification {
                label: Polarity::Negative,
                confidence: 0.5,
            },
        });
        let scorer = SentimentScorer::new(clf.clone());
        let long = "x".repeat(1000);
        let mut v = vec![art("a", &long), art("b", "c"), art("d", "e")];
        scorer.score(&mut v);
        assert_eq!(clf.calls.load(Ordering::SeqCst), 2);
        for a in &v {
            assert!((a.sentiment_score + 0.5).abs() < 1e-6);
        }
    }

    struct Broken;
    impl Classifier for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn classify_batch(&self, _: &[String]) -> anyhow::Result<Vec<Classification>> {
            anyhow::bail!("model unavailable")
        }
    }

    #[test]
    fn classifier_failure_defaults_to_zero() {
        let scorer = SentimentScorer::new(Arc::new(Broken));
        let mut v = vec![art("great", "great")];
        v[0].sentiment_score = 0.9;
        scorer.score(&mut v);
        assert_eq!(v[0].sentiment_score, 0.0);
    }
}
