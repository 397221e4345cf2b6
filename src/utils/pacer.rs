use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Keeps consecutive outbound calls at least `spacing` apart.
pub struct CallPacer {
    spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CallPacer {
    pub fn new(spacing: Duration) -> Self {
        Self { spacing, last_call: Mutex::new(None) }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Waits until the next call is allowed and marks it as issued.
    /// The first call goes through immediately.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.spacing {
                sleep(self.spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate_and_later_calls_are_spaced() {
        let pacer = CallPacer::new(Duration::from_millis(1100));
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));

        let mut stamps = Vec::new();
        for _ in 0..3 {
            pacer.wait().await;
            stamps.push(Instant::now());
        }
        assert!(stamps[0] - start >= Duration::from_millis(1100));
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_callers_are_not_delayed_further() {
        let pacer = CallPacer::new(Duration::from_secs(1));
        pacer.wait().await;
        sleep(Duration::from_secs(5)).await;
        let before = Instant::now();
        pacer.wait().await;
        assert!(before.elapsed() < Duration::from_millis(1));
    }
}
