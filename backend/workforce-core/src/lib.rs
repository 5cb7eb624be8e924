// src/lib.rs
pub mod aggregator;
pub mod cache;
pub mod cached_source;
pub mod calendar;
pub mod circuit_breaker;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod interval;
pub mod model;
pub mod reasons;
pub mod schedule;
pub mod snapshot;
pub mod source;
pub mod throttle;
pub mod toggl_client;
pub mod tracked;
pub mod worked_time;

#[cfg(test)]
mod engine_tests;

pub use config::{EngineConfig, TogglConfig};
pub use engine::{PeriodReport, SummaryEngine};
pub use error::{SummaryError, Upstream, UpstreamError};
pub use model::MonthlySummary;
