// src/source.rs
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::UpstreamError;
use crate::model::{
    AbsenceRecord, Department, Employee, Holiday, Location, Reason, Team, WorkedHours,
};
use crate::tracked::{SummaryReport, TrackerClient, TrackerProject, TrackerUser};

/// The HR / absence system, already normalized into domain types.
#[async_trait]
pub trait WorkforceSource: Send + Sync {
    async fn fetch_employees(&self) -> Result<Vec<Employee>, UpstreamError>;

    /// Approved records overlapping the month. Implementations may return
    /// unapproved records too; they are filtered again downstream.
    async fn fetch_approved_absences(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<AbsenceRecord>, UpstreamError>;

    /// Worked hours per employee, clipped to the month.
    async fn fetch_worked_hours(&self, year: i32, month: u32) -> Result<WorkedHours, UpstreamError>;

    /// All holidays across all locations.
    async fn fetch_holidays(&self) -> Result<Vec<Holiday>, UpstreamError>;

    async fn fetch_reasons(&self) -> Result<Vec<Reason>, UpstreamError>;

    async fn fetch_locations(&self) -> Result<Vec<Location>, UpstreamError> {
        Ok(Vec::new())
    }

    async fn fetch_teams(&self) -> Result<Vec<Team>, UpstreamError> {
        Ok(Vec::new())
    }

    async fn fetch_departments(&self) -> Result<Vec<Department>, UpstreamError> {
        Ok(Vec::new())
    }
}

/// The rate-limited time-tracking system.
#[async_trait]
pub trait TimeTrackingSource: Send + Sync {
    async fn fetch_users(&self) -> Result<Vec<TrackerUser>, UpstreamError>;

    async fn fetch_projects(&self) -> Result<Vec<TrackerProject>, UpstreamError>;

    async fn fetch_clients(&self) -> Result<Vec<TrackerClient>, UpstreamError>;

    /// Totals between `start` and `end`, both inclusive.
    async fn fetch_summary_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SummaryReport, UpstreamError>;
}
