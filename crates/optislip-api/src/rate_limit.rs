use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use optislip_core::util::fingerprint;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

/// Window count past which expired entries are swept on the next check.
const SWEEP_THRESHOLD: usize = 1_024;

/// Fixed-window limiter keyed by endpoint and owner.
#[derive(Clone)]
pub struct EndpointRateLimiter {
    state: Arc<Mutex<HashMap<String, RateWindow>>>,
    window: Duration,
    enqueue_limit: u32,
    dispatch_limit: u32,
    metrics: Arc<RateLimitMetrics>,
}

#[derive(Clone, Copy)]
pub enum ProtectedEndpoint {
    Enqueue,
    Dispatch,
}

#[derive(Default)]
struct RateLimitMetrics {
    enqueue_allowed: AtomicU64,
    enqueue_limited: AtomicU64,
    dispatch_allowed: AtomicU64,
    dispatch_limited: AtomicU64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitMetricsSnapshot {
    pub enqueue_allowed: u64,
    pub enqueue_limited: u64,
    pub dispatch_allowed: u64,
    pub dispatch_limited: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

impl EndpointRateLimiter {
    pub fn new(window: Duration, enqueue_limit: u32, dispatch_limit: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            window,
            enqueue_limit,
            dispatch_limit,
            metrics: Arc::new(RateLimitMetrics::default()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_window,
            config.enqueue_rate_limit_per_window,
            config.dispatch_rate_limit_per_window,
        )
    }

    pub async fn check(&self, endpoint: ProtectedEndpoint, owner_id: &str) -> Result<(), AppError> {
        let limit = match endpoint {
            ProtectedEndpoint::Enqueue => self.enqueue_limit,
            ProtectedEndpoint::Dispatch => self.dispatch_limit,
        };

        let key = format!("{}:{owner_id}", endpoint.label());
        let now = Instant::now();
        let mut guard = self.state.lock().await;
        if guard.len() >= SWEEP_THRESHOLD {
            guard.retain(|_, window| now.duration_since(window.started_at) < self.window);
        }
        let entry = guard.entry(key).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= limit {
            let retry_after_secs = self
                .window
                .saturating_sub(now.duration_since(entry.started_at))
                .as_secs()
                .max(1);
            self.mark_limited(endpoint);
            tracing::warn!(
                endpoint = endpoint.label(),
                owner = fingerprint(owner_id),
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(AppError::too_many_requests(
                "Rate limit exceeded for sync endpoint",
                retry_after_secs,
            ));
        }

        entry.count += 1;
        self.mark_allowed(endpoint);
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            enqueue_allowed: self.metrics.enqueue_allowed.load(Ordering::Relaxed),
            enqueue_limited: self.metrics.enqueue_limited.load(Ordering::Relaxed),
            dispatch_allowed: self.metrics.dispatch_allowed.load(Ordering::Relaxed),
            dispatch_limited: self.metrics.dispatch_limited.load(Ordering::Relaxed),
        }
    }

    fn mark_allowed(&self, endpoint: ProtectedEndpoint) {
        let counter = match endpoint {
            ProtectedEndpoint::Enqueue => &self.metrics.enqueue_allowed,
            ProtectedEndpoint::Dispatch => &self.metrics.dispatch_allowed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_limited(&self, endpoint: ProtectedEndpoint) {
        let counter = match endpoint {
            ProtectedEndpoint::Enqueue => &self.metrics.enqueue_limited,
            ProtectedEndpoint::Dispatch => &self.metrics.dispatch_limited,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl ProtectedEndpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Enqueue => "sync_enqueue",
            Self::Dispatch => "sync_dispatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_blocks_after_limit() {
        let limiter = EndpointRateLimiter::new(Duration::from_secs(60), 2, 2);

        limiter
            .check(ProtectedEndpoint::Enqueue, "owner-a")
            .await
            .unwrap();
        limiter
            .check(ProtectedEndpoint::Enqueue, "owner-a")
            .await
            .unwrap();

        let err = limiter
            .check(ProtectedEndpoint::Enqueue, "owner-a")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests(_, secs) if secs > 0));

        let metrics = limiter.metrics_snapshot();
        assert_eq!(metrics.enqueue_allowed, 2);
        assert_eq!(metrics.enqueue_limited, 1);
    }

    #[tokio::test]
    async fn limits_are_per_owner_and_endpoint() {
        let limiter = EndpointRateLimiter::new(Duration::from_secs(60), 5, 1);

        limiter
            .check(ProtectedEndpoint::Dispatch, "owner-a")
            .await
            .unwrap();
        limiter
            .check(ProtectedEndpoint::Dispatch, "owner-b")
            .await
            .unwrap();
        limiter
            .check(ProtectedEndpoint::Enqueue, "owner-a")
            .await
            .unwrap();
        assert!(limiter
            .check(ProtectedEndpoint::Dispatch, "owner-a")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = EndpointRateLimiter::new(Duration::from_millis(50), 1, 1);
        limiter
            .check(ProtectedEndpoint::Enqueue, "owner-a")
            .await
            .unwrap();
        assert!(limiter
            .check(ProtectedEndpoint::Enqueue, "owner-a")
            .await
            .is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        limiter
            .check(ProtectedEndpoint::Enqueue, "owner-a")
            .await
            .unwrap();
    }
}
