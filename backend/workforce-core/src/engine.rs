// src/engine.rs
use std::borrow::Cow;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregator::{MonthInputs, MonthlyAggregator};
use crate::cached_source::month_range;
use crate::config::EngineConfig;
use crate::error::SummaryError;
use crate::model::{Employee, MonthlySummary, SharedMetadata};
use crate::source::{TimeTrackingSource, WorkforceSource};
use crate::tracked::{fold_summary, match_to_employees, TrackedHours};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTracked {
    pub year: i32,
    pub month: u32,
    pub hours: Vec<TrackedHours>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReport {
    pub from_year: i32,
    pub to_year: i32,
    /// Month by month, ascending.
    pub summaries: Vec<MonthlySummary>,
    /// Empty when no time-tracking upstream is configured.
    pub tracked: Vec<MonthlyTracked>,
}

pub struct SummaryEngine {
    workforce: Arc<dyn WorkforceSource>,
    tracking: Option<Arc<dyn TimeTrackingSource>>,
    config: EngineConfig,
}

fn validate_period(year: i32, month: u32) -> Result<(), SummaryError> {
    if month_range(year, month).is_none() {
        return Err(SummaryError::InvalidPeriod { year, month });
    }
    Ok(())
}

impl SummaryEngine {
    pub fn new(workforce: Arc<dyn WorkforceSource>, config: EngineConfig) -> Self {
        Self {
            workforce,
            tracking: None,
            config,
        }
    }

    pub fn with_time_tracking(mut self, tracking: Arc<dyn TimeTrackingSource>) -> Self {
        self.tracking = Some(tracking);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Month-independent collections, fetched once for multi-month work.
    pub async fn fetch_shared_metadata(&self) -> Result<SharedMetadata, SummaryError> {
        let (employees, reasons, departments, locations, teams) = tokio::try_join!(
            self.workforce.fetch_employees(),
            self.workforce.fetch_reasons(),
            self.workforce.fetch_departments(),
            self.workforce.fetch_locations(),
            self.workforce.fetch_teams(),
        )?;
        Ok(SharedMetadata {
            employees,
            reasons,
            departments,
            locations,
            teams,
        })
    }

    /// One summary per active employee for the month.
    ///
    /// `shared` skips refetching employees, reasons and organisation data.
    pub async fn generate_monthly_summary(
        &self,
        year: i32,
        month: u32,
        shared: Option<&SharedMetadata>,
    ) -> Result<Vec<MonthlySummary>, SummaryError> {
        validate_period(year, month)?;
        debug!("Generating monthly summary for {}-{:02}", year, month);

        let metadata = async {
            match shared {
                Some(metadata) => Ok(Cow::Borrowed(metadata)),
                None => self.fetch_shared_metadata().await.map(Cow::Owned),
            }
        };
        let month_data = async {
            tokio::try_join!(
                self.workforce.fetch_approved_absences(year, month),
                self.workforce.fetch_worked_hours(year, month),
                self.workforce.fetch_holidays(),
            )
            .map_err(SummaryError::from)
        };
        let (metadata, (absences, worked_hours, holidays)) =
            tokio::try_join!(metadata, month_data)?;

        let inputs = MonthInputs {
            employees: &metadata.employees,
            absences: &absences,
            holidays: &holidays,
            reasons: &metadata.reasons,
            locations: &metadata.locations,
            teams: &metadata.teams,
            departments: &metadata.departments,
            worked_hours: &worked_hours,
        };
        let summaries =
            MonthlyAggregator::new(inputs, self.config.default_weekly_hours).summarize(year, month);
        info!(
            "Monthly summary for {}-{:02}: {} employees, {} absence records",
            year,
            month,
            summaries.len(),
            absences.len()
        );
        Ok(summaries)
    }

    pub async fn get_employee_monthly_summary(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlySummary>, SummaryError> {
        let summaries = self.generate_monthly_summary(year, month, None).await?;
        Ok(summaries.into_iter().find(|s| s.employee_id == employee_id))
    }

    /// Tracked hours for the month, or an empty list when time tracking is not configured.
    pub async fn tracked_hours(
        &self,
        year: i32,
        month: u32,
        employees: Option<&[Employee]>,
    ) -> Result<Vec<TrackedHours>, SummaryError> {
        let range = month_range(year, month).ok_or(SummaryError::InvalidPeriod { year, month })?;
        let Some(tracking) = &self.tracking else {
            return Ok(Vec::new());
        };

        let fetched;
        let employees = match employees {
            Some(employees) => employees,
            None => {
                fetched = self.workforce.fetch_employees().await?;
                &fetched[..]
            }
        };

        let (users, projects, clients) = tokio::try_join!(
            tracking.fetch_users(),
            tracking.fetch_projects(),
            tracking.fetch_clients(),
        )?;
        let report = tracking.fetch_summary_report(range.start, range.end).await?;
        let totals = fold_summary(&report, &projects, &clients);
        Ok(match_to_employees(&totals, &users, employees))
    }

    /// All months of `from_year..=to_year`. Metadata is fetched once, month
    /// summaries run concurrently, tracked hours with bounded concurrency.
    pub async fn generate_period_report(
        &self,
        from_year: i32,
        to_year: i32,
    ) -> Result<PeriodReport, SummaryError> {
        let max_years = self.config.max_report_years;
        let span = i64::from(to_year) - i64::from(from_year);
        if span < 0 || span > i64::from(max_years) {
            return Err(SummaryError::RangeTooLarge {
                from_year,
                to_year,
                max_years,
            });
        }

        let months: Vec<(i32, u32)> = (from_year..=to_year)
            .flat_map(|year| (1..=12).map(move |month| (year, month)))
            .collect();
        info!(
            "Generating period report {}-{} ({} months)",
            from_year,
            to_year,
            months.len()
        );

        let metadata = self.fetch_shared_metadata().await?;

        let per_month = futures::future::try_join_all(
            months
                .iter()
                .map(|&(year, month)| self.generate_monthly_summary(year, month, Some(&metadata))),
        )
        .await?;
        let summaries = per_month.into_iter().flatten().collect();

        let tracked = if self.tracking.is_some() {
            stream::iter(months.iter().copied())
                .map(|(year, month)| {
                    let employees = &metadata.employees[..];
                    async move {
                        let hours = self.tracked_hours(year, month, Some(employees)).await?;
                        Ok::<_, SummaryError>(MonthlyTracked { year, month, hours })
                    }
                })
                .buffered(self.config.tracking_batch_size.max(1))
                .try_collect()
                .await?
        } else {
            Vec::new()
        };

        Ok(PeriodReport {
            from_year,
            to_year,
            summaries,
            tracked,
        })
    }
}

