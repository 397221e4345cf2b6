use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::AppResult;

/// Bounded exponential backoff shared by every outbound client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Extra random delay, as a fraction of the computed delay.
    pub jitter: f64,
}

/// Outcome of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub result: AppResult<T>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Delay before the next attempt, after `failed` attempts have failed.
    /// Excludes jitter.
    pub fn delay_for(&self, failed: u32) -> Duration {
        let exp = failed.saturating_sub(1) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = rand::rng().random_range(0.0..=self.jitter * delay.as_secs_f64());
        delay + Duration::from_secs_f64(extra)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Retried<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Retried { result: Ok(value), attempts: attempt },
                Err(e) if e.is_transient() && attempt < max => {
                    let delay = self.with_jitter(self.delay_for(attempt));
                    warn!(
                        "⚠️ {} failed (attempt {}/{}): {}. Retrying in {:.1}s...",
                        label, attempt, max, e, delay.as_secs_f64()
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Retried { result: Err(e), attempts: attempt },
            }
        }
    }
}
