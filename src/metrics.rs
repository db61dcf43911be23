use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for the request pipeline
#[derive(Clone)]
pub struct Metrics {
    pub requests_admitted: Arc<AtomicU64>,
    pub requests_rate_limited: Arc<AtomicU64>,
    pub auth_failures: Arc<AtomicU64>,
    pub panics_recovered: Arc<AtomicU64>,
    pub background_spawned: Arc<AtomicU64>,
    pub background_failed: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_admitted: Arc::new(AtomicU64::new(0)),
            requests_rate_limited: Arc::new(AtomicU64::new(0)),
            auth_failures: Arc::new(AtomicU64::new(0)),
            panics_recovered: Arc::new(AtomicU64::new(0)),
            background_spawned: Arc::new(AtomicU64::new(0)),
            background_failed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_admitted(&self) {
        self.requests_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.requests_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_panics(&self) {
        self.panics_recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_background_spawned(&self) {
        self.background_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_background_failed(&self) {
        self.background_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_admitted: self.requests_admitted.load(Ordering::Relaxed),
            requests_rate_limited: self.requests_rate_limited.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            panics_recovered: self.panics_recovered.load(Ordering::Relaxed),
            background_spawned: self.background_spawned.load(Ordering::Relaxed),
            background_failed: self.background_failed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_admitted: u64,
    pub requests_rate_limited: u64,
    pub auth_failures: u64,
    pub panics_recovered: u64,
    pub background_spawned: u64,
    pub background_failed: u64,
    pub uptime_seconds: u64,
}
