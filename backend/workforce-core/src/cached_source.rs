// src/cached_source.rs
//! Caching decorators for the two upstreams.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use futures::future::BoxFuture;
use tracing::debug;

use crate::cache::TtlCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::dates::{is_in_month, month_end};
use crate::error::{Upstream, UpstreamError};
use crate::model::{
    AbsenceRecord, Department, Employee, Holiday, Location, Reason, Team, WorkedHours,
};
use crate::source::{TimeTrackingSource, WorkforceSource};
use crate::throttle::{retry_rate_limited, Throttle};
use crate::tracked::{SummaryReport, TrackerClient, TrackerProject, TrackerUser};

const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeKey {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Month data changes while the month is running; older months are settled.
pub fn month_ttl(config: &EngineConfig, year: i32, month: u32, today: NaiveDate) -> Duration {
    if is_in_month(today, year, month) {
        config.current_month_ttl()
    } else {
        config.historical_month_ttl()
    }
}

fn range_ttl(config: &EngineConfig, range: RangeKey, today: NaiveDate) -> Duration {
    if range.start <= today && today <= range.end {
        config.current_month_ttl()
    } else {
        config.historical_month_ttl()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// --- Workforce ---

/// Caches every workforce resource except absences, which are always fetched fresh.
pub struct CachedWorkforce<S> {
    source: Arc<S>,
    config: EngineConfig,
    employees: TtlCache<String, Vec<Employee>>,
    holidays: TtlCache<String, Vec<Holiday>>,
    reasons: TtlCache<String, Vec<Reason>>,
    locations: TtlCache<String, Vec<Location>>,
    teams: TtlCache<String, Vec<Team>>,
    departments: TtlCache<String, Vec<Department>>,
    worked_hours: TtlCache<MonthKey, WorkedHours>,
}

impl<S: WorkforceSource + 'static> CachedWorkforce<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            source: Arc::new(source),
            employees: TtlCache::new("employees"),
            holidays: TtlCache::new("holidays"),
            reasons: TtlCache::new("reasons"),
            locations: TtlCache::new("locations"),
            teams: TtlCache::new("teams"),
            departments: TtlCache::new("departments"),
            worked_hours: TtlCache::bounded("worked hours", config.max_month_entries),
            config,
        }
    }
}

macro_rules! cached_collection {
    ($self:ident, $cache:ident, $ttl:expr, $fetch:ident) => {{
        let source = Arc::clone(&$self.source);
        $self
            .$cache
            .get_or_fetch(ALL.to_string(), $ttl, move || async move { source.$fetch().await })
            .await
    }};
}

#[async_trait]
impl<S: WorkforceSource + 'static> WorkforceSource for CachedWorkforce<S> {
    async fn fetch_employees(&self) -> Result<Vec<Employee>, UpstreamError> {
        cached_collection!(self, employees, self.config.employees_ttl(), fetch_employees)
    }

    async fn fetch_approved_absences(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<AbsenceRecord>, UpstreamError> {
        self.source.fetch_approved_absences(year, month).await
    }

    async fn fetch_worked_hours(
        &self,
        year: i32,
        month: u32,
    ) -> Result<WorkedHours, UpstreamError> {
        let source = Arc::clone(&self.source);
        let ttl = month_ttl(&self.config, year, month, today());
        self.worked_hours
            .get_or_fetch(MonthKey { year, month }, ttl, move || async move {
                source.fetch_worked_hours(year, month).await
            })
            .await
    }

    async fn fetch_holidays(&self) -> Result<Vec<Holiday>, UpstreamError> {
        cached_collection!(self, holidays, self.config.holidays_ttl(), fetch_holidays)
    }

    async fn fetch_reasons(&self) -> Result<Vec<Reason>, UpstreamError> {
        cached_collection!(self, reasons, self.config.reasons_ttl(), fetch_reasons)
    }

    async fn fetch_locations(&self) -> Result<Vec<Location>, UpstreamError> {
        cached_collection!(self, locations, self.config.metadata_ttl(), fetch_locations)
    }

    async fn fetch_teams(&self) -> Result<Vec<Team>, UpstreamError> {
        cached_collection!(self, teams, self.config.metadata_ttl(), fetch_teams)
    }

    async fn fetch_departments(&self) -> Result<Vec<Department>, UpstreamError> {
        cached_collection!(self, departments, self.config.metadata_ttl(), fetch_departments)
    }
}

// --- Time tracking ---

/// Upstream access with the circuit breaker, call spacing and 429 retries applied.
struct Guarded<S> {
    source: S,
    breaker: CircuitBreaker,
    throttle: Throttle,
    max_retries: u32,
    backoff: Duration,
}

impl<S: TimeTrackingSource> Guarded<S> {
    async fn call<T, F>(&self, what: &str, call: F) -> Result<T, UpstreamError>
    where
        F: for<'a> Fn(&'a S) -> BoxFuture<'a, Result<T, UpstreamError>>,
    {
        self.breaker.check()?;
        let result = retry_rate_limited(self.max_retries, self.backoff, || async {
            self.throttle.acquire().await;
            debug!("Calling time-tracking upstream for {}", what);
            call(&self.source).await
        })
        .await;
        self.breaker.record(&result);
        result
    }
}

pub struct CachedTimeTracking<S> {
    guarded: Arc<Guarded<S>>,
    config: EngineConfig,
    users: TtlCache<String, Vec<TrackerUser>>,
    projects: TtlCache<String, Vec<TrackerProject>>,
    clients: TtlCache<String, Vec<TrackerClient>>,
    summaries: TtlCache<RangeKey, SummaryReport>,
}

impl<S: TimeTrackingSource + 'static> CachedTimeTracking<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        let guarded = Guarded {
            source,
            breaker: CircuitBreaker::new(Upstream::TimeTracking, config.circuit_cooldown()),
            throttle: Throttle::new(config.min_call_spacing()),
            max_retries: config.max_rate_limit_retries,
            backoff: config.rate_limit_backoff(),
        };
        Self {
            guarded: Arc::new(guarded),
            users: TtlCache::new("tracker users"),
            projects: TtlCache::new("tracker projects"),
            clients: TtlCache::new("tracker clients"),
            summaries: TtlCache::bounded("tracker summaries", config.max_month_entries),
            config,
        }
    }

    /// Remaining cool-down while the upstream is paused after quota exhaustion.
    pub fn paused_for(&self) -> Option<Duration> {
        self.guarded.breaker.remaining()
    }
}

#[async_trait]
impl<S: TimeTrackingSource + 'static> TimeTrackingSource for CachedTimeTracking<S> {
    async fn fetch_users(&self) -> Result<Vec<TrackerUser>, UpstreamError> {
        let guarded = Arc::clone(&self.guarded);
        self.users
            .get_or_fetch(ALL.to_string(), self.config.metadata_ttl(), move || async move {
                guarded.call("users", |s| s.fetch_users()).await
            })
            .await
    }

    async fn fetch_projects(&self) -> Result<Vec<TrackerProject>, UpstreamError> {
        let guarded = Arc::clone(&self.guarded);
        self.projects
            .get_or_fetch(ALL.to_string(), self.config.metadata_ttl(), move || async move {
                guarded.call("projects", |s| s.fetch_projects()).await
            })
            .await
    }

    async fn fetch_clients(&self) -> Result<Vec<TrackerClient>, UpstreamError> {
        let guarded = Arc::clone(&self.guarded);
        self.clients
            .get_or_fetch(ALL.to_string(), self.config.metadata_ttl(), move || async move {
                guarded.call("clients", |s| s.fetch_clients()).await
            })
            .await
    }

    async fn fetch_summary_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SummaryReport, UpstreamError> {
        let key = RangeKey { start, end };
        let ttl = range_ttl(&self.config, key, today());
        let guarded = Arc::clone(&self.guarded);
        self.summaries
            .get_or_fetch(key, ttl, move || async move {
                guarded
                    .call("summary report", move |s| s.fetch_summary_report(start, end))
                    .await
            })
            .await
    }
}

/// Inclusive date range of a calendar month.
pub fn month_range(year: i32, month: u32) -> Option<RangeKey> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = month_end(year, month)?;
    Some(RangeKey { start, end })
}
