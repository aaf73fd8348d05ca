use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// ± jitter applied to each delay, in percent. 0 keeps delays exact.
    pub jitter_pct: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            jitter_pct: 0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.retry_max,
            base_delay: Duration::from_millis(cfg.retry_base_delay_ms),
            jitter_pct: cfg.retry_jitter_pct,
        }
    }

    /// `base_delay * 2^attempt`, attempt being 0-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(apply_jitter(ms, self.jitter_pct))
    }
}

fn apply_jitter(ms: u64, pct: u8) -> u64 {
    let span = (ms as i64).saturating_mul(pct as i64) / 100;
    if span == 0 {
        return ms;
    }
    let offset = rand::thread_rng().gen_range(-span..=span);
    (ms as i64 + offset).max(0) as u64
}

/// Runs `op` until it succeeds or `max_retries` attempts are spent, sleeping
/// with exponential backoff in between. The last error is returned as is.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(%label, attempt = attempt + 1, attempts, delay_ms = delay.as_millis() as u64, error = %e, "retry.backoff");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
