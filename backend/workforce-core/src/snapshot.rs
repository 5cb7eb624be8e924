// src/snapshot.rs
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::dates::{month_end, month_start, parse_local_date};
use crate::error::{Upstream, UpstreamError};
use crate::model::{
    AbsenceRecord, Department, Employee, Holiday, Location, Reason, Team, WorkedHours,
};
use crate::source::WorkforceSource;
use crate::worked_time::{sum_work_hours, Timespan};

pub const EMPLOYEES_FILE: &str = "employees.json";
pub const ABSENCES_FILE: &str = "absences.json";
pub const HOLIDAYS_FILE: &str = "holidays.json";
pub const REASONS_FILE: &str = "reasons.json";
pub const LOCATIONS_FILE: &str = "locations.json";
pub const TEAMS_FILE: &str = "teams.json";
pub const DEPARTMENTS_FILE: &str = "departments.json";
pub const TIMESPANS_FILE: &str = "timespans.json";

/// Workforce data exported to a directory of JSON arrays.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    dir: PathBuf,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A missing file reads as an empty collection. Records that fail to
    /// decode are skipped with a warning; only a file that is not a JSON
    /// array is an error.
    async fn read_collection<T: DeserializeOwned>(
        &self,
        file: &str,
    ) -> Result<Vec<T>, UpstreamError> {
        let path = self.dir.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Snapshot file {:?} not found, treating as empty", path);
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(UpstreamError::Transport {
                    upstream: Upstream::Workforce,
                    message: format!("Failed to read {:?}: {}", path, e),
                })
            }
        };
        let records: Vec<serde_json::Value> =
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode {
                upstream: Upstream::Workforce,
                message: format!("{:?}: {}", path, e),
            })?;
        let total = records.len();
        let items: Vec<T> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping record {} in {:?}: {}", index, path, e);
                    None
                }
            })
            .collect();
        debug!("Loaded {} of {} records from {:?}", items.len(), total, path);
        Ok(items)
    }
}

#[async_trait]
impl WorkforceSource for SnapshotSource {
    async fn fetch_employees(&self) -> Result<Vec<Employee>, UpstreamError> {
        self.read_collection(EMPLOYEES_FILE).await
    }

    async fn fetch_approved_absences(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<AbsenceRecord>, UpstreamError> {
        let (Some(first), Some(last)) = (month_start(year, month), month_end(year, month)) else {
            return Ok(Vec::new());
        };
        let records: Vec<AbsenceRecord> = self.read_collection(ABSENCES_FILE).await?;
        // Overlap with the month; records without dates are kept and filtered per day later.
        Ok(records
            .into_iter()
            .filter(AbsenceRecord::is_approved)
            .filter(|r| {
                let start = r.start.as_deref().and_then(parse_local_date);
                let end = r.end.as_deref().and_then(parse_local_date);
                start.map_or(true, |s| s <= last) && end.map_or(true, |e| e >= first)
            })
            .collect())
    }

    async fn fetch_worked_hours(
        &self,
        year: i32,
        month: u32,
    ) -> Result<WorkedHours, UpstreamError> {
        let timespans: Vec<Timespan> = self.read_collection(TIMESPANS_FILE).await?;
        Ok(sum_work_hours(&timespans, year, month))
    }

    async fn fetch_holidays(&self) -> Result<Vec<Holiday>, UpstreamError> {
        self.read_collection(HOLIDAYS_FILE).await
    }

    async fn fetch_reasons(&self) -> Result<Vec<Reason>, UpstreamError> {
        self.read_collection(REASONS_FILE).await
    }

    async fn fetch_locations(&self) -> Result<Vec<Location>, UpstreamError> {
        self.read_collection(LOCATIONS_FILE).await
    }

    async fn fetch_teams(&self) -> Result<Vec<Team>, UpstreamError> {
        self.read_collection(TEAMS_FILE).await
    }

    async fn fetch_departments(&self) -> Result<Vec<Department>, UpstreamError> {
        self.read_collection(DEPARTMENTS_FILE).await
    }
}
