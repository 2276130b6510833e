// src/cache.rs
//! In-memory digest cache with an absolute TTL. Only successful digests are stored.

use crate::pipeline::Digest;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const MAX_ENTRIES: usize = 256;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_cache_hits_total", "Digest cache hits.");
        describe_counter!("digest_cache_misses_total", "Digest cache misses.");
    });
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    digest: Digest,
}

#[derive(Debug)]
pub struct DigestCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl DigestCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Case/whitespace-insensitive query + lookback, hashed.
    pub fn key(query: &str, days: u32) -> String {
        let norm = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(norm.as_bytes());
        hasher.update(b"|");
        hasher.update(days.to_le_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(32);
        for b in digest.iter().take(16) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    pub fn get(&self, query: &str, days: u32) -> Option<Digest> {
        self.get_at(query, days, Instant::now())
    }

    pub fn get_at(&self, query: &str, days: u32, now: Instant) -> Option<Digest> {
        ensure_metrics_described();
        if self.ttl.is_zero() {
            return None;
        }
        let key = Self::key(query, days);
        let mut map = self.entries.lock();
        let hit = match map.get(&key) {
            Some(e) if now.saturating_duration_since(e.stored_at) < self.ttl => {
                Some(e.digest.clone())
            }
            Some(_) => {
                map.remove(&key);
                None
            }
            None => None,
        };
        if hit.is_some() {
            counter!("digest_cache_hits_total").increment(1);
        } else {
            counter!("digest_cache_misses_total").increment(1);
        }
        hit
    }

    pub fn put(&self, query: &str, days: u32, digest: Digest) {
        self.put_at(query, days, digest, Instant::now());
    }

    pub fn put_at(&self, query: &str, days: u32, digest: Digest, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        let mut map = self.entries.lock();
        if map.len() >= MAX_ENTRIES {
            let ttl = self.ttl;
            map.retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
            if map.len() >= MAX_ENTRIES {
                if let Some(oldest) = map
                    .iter()
                    .min_by_key(|(_, e)| e.stored_at)
                    .map(|(k, _)| k.clone())
                {
                    map.remove(&oldest);
                }
            }
        }
        map.insert(
            Self::key(query, days),
            Entry {
                stored_at: now,
                digest,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
