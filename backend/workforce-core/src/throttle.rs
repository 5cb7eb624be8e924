// src/throttle.rs
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::error::UpstreamError;

/// Enforces a minimum spacing between calls, across all tasks.
#[derive(Debug)]
pub struct Throttle {
    spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_call: Mutex::new(None),
        }
    }

    /// Waits for the next free slot and claims it.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let ready_at = last + self.spacing;
            if ready_at > Instant::now() {
                debug!(
                    "Throttling call for {}ms",
                    (ready_at - Instant::now()).as_millis()
                );
                sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// Retries `call` on `RateLimited` with linear backoff (`backoff * attempt`).
/// Every other error is returned immediately.
pub async fn retry_rate_limited<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    mut call: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Err(UpstreamError::RateLimited { upstream }) if attempt < max_retries => {
                attempt += 1;
                let wait = backoff * attempt;
                warn!(
                    "{} rate limited, retry {}/{} in {}s",
                    upstream,
                    attempt,
                    max_retries,
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
            }
            other => return other,
        }
    }
}
