use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct Limits {
    /// Requests allowed per `window`; 0 disables limiting.
    pub requests_per_window: u64,
    pub window: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            requests_per_window: 150,
            window: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // token bucket modeled by the current tokens and the time of last refill
    tokens: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let capacity = limits.requests_per_window as f64;
        Self {
            inner: Arc::new(Inner {
                limits,
                tokens: Mutex::new((capacity, Instant::now())),
            }),
        }
    }

    /// Waits until one more request fits in the window.
    pub async fn acquire(&self) {
        let capacity = self.inner.limits.requests_per_window as f64;
        let period_secs = self.inner.limits.window.as_secs_f64();
        if capacity <= 0.0 || period_secs <= 0.0 {
            return;
        }
        let refill_rate = capacity / period_secs; // tokens per second
        loop {
            let mut guard = self.inner.tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tracing::debug!("Rate limit reached, waiting {:.2}s", secs);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}
