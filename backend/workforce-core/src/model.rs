// src/model.rs

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

pub type EmployeeId = String;
pub type LocationId = String;

// --- Upstream collections (normalized by the fetching layer) ---

/// Upstream normalizers emit `null` for absent lists and flags.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team_ids: Vec<String>,
    /// Used when the employee has no schedules at all. Zero counts as unset.
    #[serde(default)]
    pub weekly_hours: Option<Decimal>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub employment_start_date: Option<String>,
    #[serde(default)]
    pub employment_end_date: Option<String>,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

/// One effective-dated weekly schedule.
///
/// `days[0]` maps weekday keys "0" (Sunday) through "6" (Saturday) to a day
/// configuration, mirroring the upstream payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default, alias = "start")]
    pub effective_from: Option<String>,
    #[serde(default)]
    pub schedule_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub days: Vec<BTreeMap<String, Option<DayConfig>>>,
}

impl Schedule {
    /// `weekday` counts from Sunday = 0.
    pub fn day(&self, weekday: u32) -> Option<&DayConfig> {
        self.days
            .first()?
            .get(&weekday.to_string())
            .and_then(|config| config.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DayConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default, alias = "shifts", deserialize_with = "null_as_default")]
    pub shift: Vec<Shift>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Shift {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// One entry per year the holiday occurs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dates: Vec<String>,
    /// Empty means the holiday is not tied to specific locations.
    #[serde(default, deserialize_with = "null_as_default")]
    pub location_ids: Vec<LocationId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub holiday_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub member_ids: Vec<EmployeeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reason {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub counts_as_work: Option<bool>,
    #[serde(default)]
    pub reduces_days: Option<bool>,
}

/// Upstream status is either a numeric code (0 pending, 1 rejected,
/// 2 approved) or a label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AbsenceStatus {
    Code(i64),
    Label(String),
}

impl AbsenceStatus {
    pub fn is_approved(&self) -> bool {
        match self {
            AbsenceStatus::Code(code) => *code == 2,
            AbsenceStatus::Label(label) => label == "approved" || label == "confirmedByApprover",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceRecord {
    pub id: String,
    #[serde(alias = "assignedToId", alias = "userId")]
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub reason_id: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    /// Per-day breakdown as computed by the absence system.
    #[serde(default, deserialize_with = "null_as_default")]
    pub days: Vec<AbsenceDay>,
    #[serde(default)]
    pub days_count: Option<Decimal>,
    #[serde(default)]
    pub status: Option<AbsenceStatus>,
}

impl AbsenceRecord {
    pub fn is_approved(&self) -> bool {
        self.status.as_ref().is_some_and(AbsenceStatus::is_approved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbsenceDay {
    #[serde(default)]
    pub date: Option<String>,
    /// Fraction of the day taken (1 = full day, 0.5 = half day).
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub holiday: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weekend: bool,
}

impl AbsenceDay {
    /// The record itself considers this a working day that was taken off.
    pub fn is_working_day(&self) -> bool {
        self.value > Decimal::ZERO && !self.holiday && !self.weekend
    }
}

/// Worked hours per employee for one month, already clipped to the month.
pub type WorkedHours = std::collections::HashMap<EmployeeId, Decimal>;

/// Metadata fetched once and reused across several months of a report.
#[derive(Debug, Clone, Default)]
pub struct SharedMetadata {
    pub employees: Vec<Employee>,
    pub reasons: Vec<Reason>,
    pub departments: Vec<Department>,
    pub locations: Vec<Location>,
    pub teams: Vec<Team>,
}

// --- Output ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub employee_id: EmployeeId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    pub location_id: Option<LocationId>,
    pub location_name: Option<String>,
    pub team_ids: Vec<String>,
    pub team_names: Vec<String>,
    pub year: i32,
    pub month: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub weekly_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub scheduled_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub worked_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub overtime_hours: Decimal,
    pub working_days: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub absence_days: Decimal,
    pub absence_count: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub mobile_work_days: Decimal,
    pub holiday_count: u32,
}
