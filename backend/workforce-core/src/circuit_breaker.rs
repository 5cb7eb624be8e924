// src/circuit_breaker.rs
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info};

use crate::error::{Upstream, UpstreamError};

/// Refuses calls to an upstream for a fixed cool-down after it reports quota exhaustion.
///
/// Rate limiting (429) never opens the circuit; only `QuotaExhausted` does.
#[derive(Debug)]
pub struct CircuitBreaker {
    upstream: Upstream,
    cooldown: Duration,
    open_until: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(upstream: Upstream, cooldown: Duration) -> Self {
        Self {
            upstream,
            cooldown,
            open_until: Mutex::new(None),
        }
    }

    /// Time left before calls are allowed again, if the circuit is open.
    pub fn remaining(&self) -> Option<Duration> {
        let mut open_until = self.open_until.lock().unwrap_or_else(PoisonError::into_inner);
        let until = (*open_until)?;
        let now = Instant::now();
        if now >= until {
            info!("{} circuit closed after cool-down", self.upstream);
            *open_until = None;
            return None;
        }
        Some(until - now)
    }

    pub fn is_open(&self) -> bool {
        self.remaining().is_some()
    }

    /// Fails fast while the circuit is open.
    pub fn check(&self) -> Result<(), UpstreamError> {
        match self.remaining() {
            Some(remaining) => Err(UpstreamError::CircuitOpen {
                upstream: self.upstream,
                remaining,
            }),
            None => Ok(()),
        }
    }

    pub fn trip(&self) {
        let until = Instant::now() + self.cooldown;
        *self.open_until.lock().unwrap_or_else(PoisonError::into_inner) = Some(until);
        error!(
            "{} quota exhausted, pausing calls for {} minutes",
            self.upstream,
            self.cooldown.as_secs() / 60
        );
    }

    /// Opens the circuit when `result` is a quota-exhaustion error.
    pub fn record<T>(&self, result: &Result<T, UpstreamError>) {
        if let Err(UpstreamError::QuotaExhausted { .. }) = result {
            self.trip();
        }
    }

    /// Runs `call` unless the circuit is open, then records its outcome.
    pub async fn call<T, F, Fut>(&self, call: F) -> Result<T, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, UpstreamError>>,
    {
        self.check()?;
        let result = call().await;
        self.record(&result);
        result
    }
}
