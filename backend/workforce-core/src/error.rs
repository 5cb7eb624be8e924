// src/error.rs

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Identifies which external system produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    /// HR / absence management system (employees, absences, holidays, reasons).
    Workforce,
    /// Rate-limited time-tracking system (monthly tracked-hours reports).
    TimeTracking,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Workforce => write!(f, "workforce"),
            Upstream::TimeTracking => write!(f, "time-tracking"),
        }
    }
}

// Cloneable so a single deduplicated fetch can hand the same failure to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("{upstream} rate limit exceeded (Status 429)")]
    RateLimited { upstream: Upstream },

    #[error("{upstream} quota exhausted (Status 402): {message}")]
    QuotaExhausted { upstream: Upstream, message: String },

    #[error(
        "{upstream} calls are paused after quota exhaustion, retry in {}s",
        .remaining.as_secs()
    )]
    CircuitOpen {
        upstream: Upstream,
        remaining: Duration,
    },

    #[error("{upstream} API error: Status={status}, Message='{message}'")]
    Api {
        upstream: Upstream,
        status: u16,
        message: String,
    },

    #[error("{upstream} request failed: {message}")]
    Transport { upstream: Upstream, message: String },

    #[error("{upstream} returned data that could not be decoded: {message}")]
    Decode { upstream: Upstream, message: String },

    #[error("Background refresh for '{key}' ended without a result")]
    Aborted { key: String },
}

impl UpstreamError {
    pub fn upstream(&self) -> Option<Upstream> {
        match self {
            UpstreamError::RateLimited { upstream }
            | UpstreamError::QuotaExhausted { upstream, .. }
            | UpstreamError::CircuitOpen { upstream, .. }
            | UpstreamError::Api { upstream, .. }
            | UpstreamError::Transport { upstream, .. }
            | UpstreamError::Decode { upstream, .. } => Some(*upstream),
            UpstreamError::Aborted { .. } => None,
        }
    }

    /// Maps an HTTP status to the matching error class.
    pub fn from_status(upstream: Upstream, status: u16, message: String) -> Self {
        match status {
            429 => UpstreamError::RateLimited { upstream },
            402 => UpstreamError::QuotaExhausted { upstream, message },
            _ => UpstreamError::Api {
                upstream,
                status,
                message,
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Upstream data unavailable: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Invalid reporting period: {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("Report range {from_year}-{to_year} is invalid (at most {max_years} years, ascending)")]
    RangeTooLarge {
        from_year: i32,
        to_year: i32,
        max_years: i32,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SummaryError {
    /// How long until a retry can succeed, if the failure carries that information.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SummaryError::Upstream(UpstreamError::CircuitOpen { remaining, .. }) => {
                Some(*remaining)
            }
            _ => None,
        }
    }
}
