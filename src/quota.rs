// src/quota.rs
//! Per-provider admission control.
//!
//! Each source owns three fixed windows (1s / 60s / 86400s) and an ordered credential
//! ring, all behind one `parking_lot::Mutex`. Sources never contend with each other.

use crate::config::{Credential, QuotaLimits, RetryPolicy, SourceConfig};
use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const SECOND: Duration = Duration::from_secs(1);
const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(86_400);
const ROTATION_INTERVAL: Duration = Duration::from_secs(3_600);

const DERATE_FACTOR: f64 = 0.75;
const MIN_PER_MINUTE: u32 = 1;
const MIN_PER_DAY: u32 = 10;

#[derive(Debug, Clone, Copy)]
struct Window {
    len: Duration,
    count: u32,
    last_reset: Instant,
}

impl Window {
    fn new(len: Duration, now: Instant) -> Self {
        Self {
            len,
            count: 0,
            last_reset: now,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_reset) >= self.len {
            self.count = 0;
            self.last_reset = now;
        }
    }
}

#[derive(Debug)]
struct SourceState {
    limits: QuotaLimits,
    second: Window,
    minute: Window,
    day: Window,
    credentials: Vec<Credential>,
    cursor: usize,
    last_rotation: Option<Instant>,
    requires_key: bool,
    enabled: bool,
    retry: RetryPolicy,
}

impl SourceState {
    fn from_config(cfg: &SourceConfig, now: Instant) -> Self {
        Self {
            limits: cfg.quota,
            second: Window::new(SECOND, now),
            minute: Window::new(MINUTE, now),
            day: Window::new(DAY, now),
            credentials: cfg.credentials.clone(),
            cursor: 0,
            last_rotation: None,
            requires_key: cfg.requires_key,
            enabled: cfg.enabled,
            retry: cfg.retry,
        }
    }

    fn usable(&self) -> bool {
        self.enabled && (!self.requires_key || !self.credentials.is_empty())
    }
}

/// Shared by every fetch task; mutated for the life of the process.
#[derive(Debug, Default)]
pub struct QuotaManager {
    sources: HashMap<String, Mutex<SourceState>>,
}

impl QuotaManager {
    pub fn new(configs: &[SourceConfig]) -> Self {
        let now = Instant::now();
        let sources = configs
            .iter()
            .map(|c| (c.name().to_string(), Mutex::new(SourceState::from_config(c, now))))
            .collect();
        Self { sources }
    }

    /// Admit one request if all three windows have room, counting it in each.
    /// Unknown sources are never admitted.
    pub fn can_admit(&self, source: &str) -> bool {
        self.can_admit_at(source, Instant::now())
    }

    pub fn can_admit_at(&self, source: &str, now: Instant) -> bool {
        let Some(state) = self.sources.get(source) else {
            return false;
        };
        let mut st = state.lock();
        st.second.roll(now);
        st.minute.roll(now);
        st.day.roll(now);

        let admitted = st.second.count < st.limits.per_second
            && st.minute.count < st.limits.per_minute
            && st.day.count < st.limits.per_day;
        if admitted {
            st.second.count += 1;
            st.minute.count += 1;
            st.day.count += 1;
        } else {
            counter!("quota_denied_total", "source" => source.to_string()).increment(1);
        }
        admitted
    }

    /// Current credential, rotated at most once per hour. `None` when the source needs
    /// no key or every key has been evicted.
    pub fn select_credential(&self, source: &str) -> Option<Credential> {
        self.select_credential_at(source, Instant::now())
    }

    pub fn select_credential_at(&self, source: &str, now: Instant) -> Option<Credential> {
        let mut st = self.sources.get(source)?.lock();
        if !st.requires_key || st.credentials.is_empty() {
            return None;
        }
        match st.last_rotation {
            None => st.last_rotation = Some(now),
            Some(prev) if now.saturating_duration_since(prev) >= ROTATION_INTERVAL => {
                st.cursor = (st.cursor + 1) % st.credentials.len();
                st.last_rotation = Some(now);
            }
            Some(_) => {}
        }
        st.credentials.get(st.cursor).cloned()
    }

    /// Permanently derate minute/day limits by 25% (floors 1 and 10). Compounds.
    pub fn on_rate_limited(&self, source: &str) {
        let Some(state) = self.sources.get(source) else {
            return;
        };
        let mut st = state.lock();
        let old = st.limits;
        st.limits.per_minute = derate(old.per_minute, MIN_PER_MINUTE);
        st.limits.per_day = derate(old.per_day, MIN_PER_DAY);
        counter!("quota_derated_total", "source" => source.to_string()).increment(1);
        warn!(
            source,
            per_minute = st.limits.per_minute,
            per_day = st.limits.per_day,
            "provider rate limited; quota derated"
        );
    }

    /// Evict a rejected credential. Evicting the last one disables the source.
    pub fn on_auth_failed(&self, source: &str, credential_id: &str) {
        let Some(state) = self.sources.get(source) else {
            return;
        };
        let mut st = state.lock();
        let Some(pos) = st.credentials.iter().position(|c| c.id == credential_id) else {
            return;
        };
        st.credentials.remove(pos);
        if pos < st.cursor {
            st.cursor -= 1;
        }
        if st.cursor >= st.credentials.len() {
            st.cursor = 0;
        }
        counter!("credential_evicted_total", "source" => source.to_string()).increment(1);
        if st.credentials.is_empty() {
            warn!(source, credential = credential_id, "last credential evicted; source disabled");
        } else {
            info!(
                source,
                credential = credential_id,
                remaining = st.credentials.len(),
                "credential evicted"
            );
        }
    }

    pub fn limits(&self, source: &str) -> Option<QuotaLimits> {
        self.sources.get(source).map(|s| s.lock().limits)
    }

    pub fn credential_count(&self, source: &str) -> usize {
        self.sources
            .get(source)
            .map(|s| s.lock().credentials.len())
            .unwrap_or(0)
    }

    /// Enabled and, when a key is required, still holding at least one credential.
    pub fn is_enabled(&self, source: &str) -> bool {
        self.sources
            .get(source)
            .map(|s| s.lock().usable())
            .unwrap_or(false)
    }

    pub fn requires_key(&self, source: &str) -> bool {
        self.sources
            .get(source)
            .map(|s| s.lock().requires_key)
            .unwrap_or(true)
    }

    pub fn retry_policy(&self, source: &str) -> RetryPolicy {
        self.sources
            .get(source)
            .map(|s| s.lock().retry)
            .unwrap_or_else(RetryPolicy::no_retry)
    }
}

/// Never raises a limit already below its floor.
fn derate(limit: u32, floor: u32) -> u32 {
    ((limit as f64 * DERATE_FACTOR).floor() as u32)
        .max(floor)
        .min(limit)
}
