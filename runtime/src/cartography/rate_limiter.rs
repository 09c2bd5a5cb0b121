//! Per-host pacing for polite crawling.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Spaces request starts against one host by a minimum delay.
///
/// The first request goes out immediately. Waiters queue on the internal
/// lock, so concurrent callers are released one `min_delay` apart.
pub struct RateLimiter {
    min_delay: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: tokio::sync::Mutex::new(None),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until this host may be contacted again.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// One [`RateLimiter`] per host, created on first use with a shared delay.
pub struct HostGates {
    min_delay: Duration,
    limiters: DashMap<String, Arc<RateLimiter>>,
}

impl HostGates {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            limiters: DashMap::new(),
        }
    }

    /// Wait for the gate of the URL's host. Unparseable URLs share one gate.
    pub async fn acquire(&self, url: &str) {
        let limiter = Arc::clone(
            self.limiters
                .entry(host_key(url))
                .or_insert_with(|| Arc::new(RateLimiter::new(self.min_delay)))
                .value(),
        );
        // The map guard is dropped before awaiting.
        limiter.acquire().await;
    }

    /// Number of distinct hosts seen so far.
    pub fn hosts(&self) -> usize {
        self.limiters.len()
    }
}

/// Convert a delay in seconds to a `Duration`, treating negative or
/// non-finite values as zero.
pub fn delay_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

fn host_key(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str()
                .map(|h| format!("{h}:{}", u.port_or_known_default().unwrap_or(0)))
        })
        .unwrap_or_default()
}
