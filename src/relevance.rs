// src/relevance.rs
//! Relevance + popularity ranking.
//!
//! TF-IDF over the candidate set (plus the query as one more document), cosine similarity
//! against the query, popularity normalized by the set maximum, then a weighted blend.

use crate::config::QueryContext;
use crate::ingest::types::Article;
use metrics::{counter, describe_counter};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

// Words of two or more word characters.
static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("static regex"));

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("rank_kept_total", "Articles kept after relevance filtering.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankParams {
    pub top_n: usize,
    pub threshold: f32,
    pub weight_relevance: f32,
    pub weight_popularity: f32,
}

impl From<&QueryContext> for RankParams {
    fn from(ctx: &QueryContext) -> Self {
        Self {
            top_n: ctx.top_n,
            threshold: ctx.relevance_threshold,
            weight_relevance: ctx.weight_relevance,
            weight_popularity: ctx.weight_popularity,
        }
    }
}

pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    RE_TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Sparse L2-normalized TF-IDF vector: term index -> weight.
pub type SparseVec = HashMap<usize, f64>;

/// Smoothed-idf vector space fitted on a fixed corpus.
#[derive(Debug, Default)]
pub struct TfIdf {
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdf {
    /// idf(t) = ln((1 + n) / (1 + df(t))) + 1
    pub fn fit(docs: &[Vec<String>]) -> Self {
        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut df: Vec<usize> = Vec::new();
        for doc in docs {
            let mut seen = std::collections::HashSet::new();
            for tok in doc {
                let idx = match vocab.get(tok) {
                    Some(&i) => i,
                    None => {
                        let i = vocab.len();
                        vocab.insert(tok.clone(), i);
                        df.push(0);
                        i
                    }
                };
                if seen.insert(idx) {
                    df[idx] += 1;
                }
            }
        }
        let n = docs.len() as f64;
        let idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();
        Self { vocab, idf }
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    /// Raw term counts times idf, L2-normalized. Unknown terms are ignored.
    pub fn transform(&self, tokens: &[String]) -> SparseVec {
        let mut v: SparseVec = HashMap::new();
        for tok in tokens {
            if let Some(&i) = self.vocab.get(tok) {
                *v.entry(i).or_insert(0.0) += 1.0;
            }
        }
        for (i, w) in v.iter_mut() {
            *w *= self.idf[*i];
        }
        let norm = v.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            v.values_mut().for_each(|w| *w /= norm);
        }
        v
    }
}

/// Dot product of two normalized vectors, clamped to [0, 1].
pub fn cosine(a: &SparseVec, b: &SparseVec) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(i, w)| large.get(i).map(|x| w * x))
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// Score, filter, sort and truncate.
///
/// Below-threshold articles are dropped regardless of popularity. The sort is stable, so
/// equal scores keep arrival order. With no text anywhere, the first `top_n` come back
/// unscored.
pub fn rank(articles: Vec<Article>, query: &str, p: &RankParams) -> Vec<Article> {
    ensure_metrics_described();

    if articles.iter().all(|a| a.text().trim().is_empty()) {
        return articles.into_iter().take(p.top_n).collect();
    }

    let mut docs: Vec<Vec<String>> = articles.iter().map(|a| tokenize(a.text())).collect();
    let query_tokens = tokenize(query);
    docs.push(query_tokens.clone());
    let space = TfIdf::fit(&docs);
    let qv = space.transform(&query_tokens);

    let max_pop = articles
        .iter()
        .filter_map(|a| a.popularity_signal)
        .fold(0.0_f64, f64::max);

    let candidates = articles.len();
    let mut scored: Vec<Article> = articles
        .into_iter()
        .zip(docs.iter())
        .filter_map(|(mut a, tokens)| {
            let relevance = if space.is_empty() {
                0.0
            } else {
                cosine(&qv, &space.transform(tokens))
            } as f32;
            if relevance < p.threshold {
                return None;
            }
            let popularity = match a.popularity_signal {
                Some(s) if max_pop > 0.0 => (s / max_pop) as f32,
                _ => 0.0,
            };
            a.relevance_score = relevance;
            a.combined_score = p.weight_relevance * relevance + p.weight_popularity * popularity;
            Some(a)
        })
        .collect();

    scored.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    scored.truncate(p.top_n);

    counter!("rank_kept_total").increment(scored.len() as u64);
    debug!(candidates, kept = scored.len(), threshold = p.threshold, "ranked");
    scored
}
