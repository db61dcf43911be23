use super::ip::client_ip;
use crate::config::LimiterConfig;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How often idle buckets are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Buckets not seen for longer than this are dropped by the sweep.
pub const STALE_AFTER: Duration = Duration::from_secs(180);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

struct Inner {
    enabled: bool,
    rps: f64,
    burst: f64,
    trust_proxy_headers: bool,
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

/// Token bucket per client address.
///
/// Every bucket lives in one map behind one lock; `allow` and the sweep both
/// take it, and neither holds it across an await.
#[derive(Clone)]
pub struct RateLimiterRegistry {
    inner: Arc<Inner>,
}

impl RateLimiterRegistry {
    pub fn new(cfg: &LimiterConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                enabled: cfg.enabled,
                rps: cfg.rps,
                burst: f64::from(cfg.burst),
                trust_proxy_headers: cfg.trust_proxy_headers,
                buckets: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    pub fn trusts_proxy_headers(&self) -> bool {
        self.inner.trust_proxy_headers
    }

    /// Takes one token from `ip`'s bucket, creating a full bucket on first sight.
    pub fn allow(&self, ip: IpAddr) -> bool {
        if !self.inner.enabled {
            return true;
        }
        let now = Instant::now();
        let mut buckets = self.lock();
        let bucket = buckets.entry(ip).or_insert_with(|| Bucket {
            tokens: self.inner.burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.inner.rps).min(self.inner.burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops buckets idle for longer than [`STALE_AFTER`]; returns how many went.
    pub fn sweep_idle(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.last_seen) <= STALE_AFTER);
        before - buckets.len()
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs [`sweep_idle`](Self::sweep_idle) every [`SWEEP_INTERVAL`] until `cancel` fires.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.sweep_idle();
                        if removed > 0 {
                            debug!("rate limiter evicted {} idle client(s)", removed);
                        }
                    }
                }
            }
            debug!("rate limiter sweep stopped");
        })
    }

    // Poisoning is ignored; a bucket is never left half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, Bucket>> {
        self.inner.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission control middleware. Sits just inside panic recovery.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, AppError> {
    let limiter = &state.limiter;
    if limiter.is_enabled() {
        let ip = client_ip(&req, limiter.trusts_proxy_headers())
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("client address unavailable for rate limiting")))?;
        if !limiter.allow(ip) {
            state.metrics.inc_rate_limited();
            debug!(%ip, "rate limit exceeded");
            return Err(AppError::RateLimited);
        }
    }
    state.metrics.inc_admitted();
    Ok(next.run(req).await)
}
