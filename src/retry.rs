use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Capped exponential backoff for transient Steam failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Fraction of the delay randomly added or removed, 0 disables jitter.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&crate::config::RetryConfig::default())
    }
}

impl RetryPolicy {
    /// A policy that retries immediately, for tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay before retry number `retry` (0-based), before jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        Duration::from_secs_f64((base.as_secs_f64() * (1.0 + spread)).max(0.0))
    }
}

/// Result of a single attempt inside [`retry`].
#[derive(Debug)]
pub enum Attempt<T> {
    Ready(T),
    /// Worth retrying; carries a short reason for the logs.
    Transient(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Success { value: T, retries: u32 },
    Exhausted { attempts: u32, last_reason: String },
}

/// Runs `op` until it is ready, sleeping between transient failures.
/// A hard error from `op` is returned immediately.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<RetryOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>, E>>,
{
    let mut retries = 0;
    loop {
        match op().await? {
            Attempt::Ready(value) => return Ok(RetryOutcome::Success { value, retries }),
            Attempt::Transient(reason) => {
                if retries >= policy.max_retries {
                    return Ok(RetryOutcome::Exhausted {
                        attempts: retries + 1,
                        last_reason: reason,
                    });
                }
                let delay = policy.delay(retries);
                warn!(
                    "{} failed ({}); retry {}/{} in {:?}",
                    what,
                    reason,
                    retries + 1,
                    policy.max_retries,
                    delay
                );
                crate::metrics::requests::transient_failure();
                tokio::time::sleep(delay).await;
                retries += 1;
            }
        }
    }
}
