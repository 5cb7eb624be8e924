// src/tracked.rs
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dates::round2;
use crate::model::{Employee, EmployeeId};

pub type TrackerUserId = u64;

// --- Time-tracking payloads ---

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrackerUser {
    pub id: TrackerUserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrackerProject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub client_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrackerClient {
    pub id: u64,
    pub name: String,
}

/// Summary report grouped by user, sub-grouped by project.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct SummaryReport {
    #[serde(default)]
    pub groups: Vec<SummaryGroup>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SummaryGroup {
    #[serde(default)]
    pub id: Option<TrackerUserId>,
    #[serde(default)]
    pub sub_groups: Vec<SummarySubGroup>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SummarySubGroup {
    /// Project id; absent for entries without a project.
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub billable_seconds: Option<u64>,
    #[serde(default)]
    pub rates: Option<Vec<SummaryRate>>,
}

impl SummarySubGroup {
    fn billable(&self) -> u64 {
        self.billable_seconds.unwrap_or_else(|| {
            self.rates
                .iter()
                .flatten()
                .map(|rate| rate.billable_seconds.unwrap_or(0))
                .sum()
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SummaryRate {
    #[serde(default)]
    pub billable_seconds: Option<u64>,
}

// --- Folded results ---

/// One project's share of a user's month. Keyed by project id, `None` for
/// entries without a project.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectTotals {
    pub project_name: String,
    pub client_id: Option<u64>,
    pub client_name: String,
    pub total_seconds: u64,
    pub billable_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserTotals {
    pub total_seconds: u64,
    pub billable_seconds: u64,
    pub project_names: Vec<String>,
    pub client_names: Vec<String>,
    pub projects: BTreeMap<Option<u64>, ProjectTotals>,
}

fn project_totals(
    project_id: Option<u64>,
    projects: &HashMap<u64, &TrackerProject>,
    clients: &HashMap<u64, &str>,
) -> ProjectTotals {
    let project = project_id.and_then(|id| projects.get(&id));
    let project_name = match (project, project_id) {
        (Some(project), _) => project.name.clone(),
        (None, Some(id)) => format!("Project {}", id),
        (None, None) => "No Project".to_string(),
    };
    let client_id = project.and_then(|p| p.client_id);
    let client_name = match client_id {
        Some(id) => clients
            .get(&id)
            .map_or_else(|| format!("Client {}", id), |name| name.to_string()),
        None => "No Client".to_string(),
    };
    ProjectTotals {
        project_name,
        client_id,
        client_name,
        ..ProjectTotals::default()
    }
}

/// Per-user totals for a month with project and client names resolved.
pub fn fold_summary(
    report: &SummaryReport,
    projects: &[TrackerProject],
    clients: &[TrackerClient],
) -> HashMap<TrackerUserId, UserTotals> {
    let projects: HashMap<u64, &TrackerProject> = projects.iter().map(|p| (p.id, p)).collect();
    let clients: HashMap<u64, &str> = clients.iter().map(|c| (c.id, c.name.as_str())).collect();

    let mut result = HashMap::new();
    for group in &report.groups {
        let Some(user_id) = group.id else {
            continue;
        };
        let mut totals = UserTotals::default();
        let mut project_ids = BTreeSet::new();
        for sub in &group.sub_groups {
            let billable = sub.billable();
            totals.total_seconds += sub.seconds;
            totals.billable_seconds += billable;
            if let Some(id) = sub.id {
                project_ids.insert(id);
            }
            let project = totals
                .projects
                .entry(sub.id)
                .or_insert_with(|| project_totals(sub.id, &projects, &clients));
            project.total_seconds += sub.seconds;
            project.billable_seconds += billable;
        }

        let mut client_ids = BTreeSet::new();
        for project in project_ids.iter().filter_map(|id| projects.get(id)) {
            totals.project_names.push(project.name.clone());
            if let Some(client_id) = project.client_id {
                client_ids.insert(client_id);
            }
        }
        totals.client_names = client_ids
            .iter()
            .filter_map(|id| clients.get(id).map(|name| name.to_string()))
            .collect();

        result.insert(user_id, totals);
    }
    result
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedHours {
    pub tracker_user_id: TrackerUserId,
    /// `None` when no employee shares the tracker user's e-mail.
    pub employee_id: Option<EmployeeId>,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub billable_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub non_billable_hours: Decimal,
    pub projects: Vec<String>,
    pub clients: Vec<String>,
    /// Ordered by project id, entries without a project first.
    pub project_breakdown: Vec<ProjectHours>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHours {
    pub project_id: Option<u64>,
    pub project_name: String,
    pub client_id: Option<u64>,
    pub client_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub billable_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub non_billable_hours: Decimal,
}

impl ProjectHours {
    fn from_totals(project_id: Option<u64>, totals: &ProjectTotals) -> Self {
        let total_hours = seconds_to_hours(totals.total_seconds);
        let billable_hours = seconds_to_hours(totals.billable_seconds);
        Self {
            project_id,
            project_name: totals.project_name.clone(),
            client_id: totals.client_id,
            client_name: totals.client_name.clone(),
            total_hours,
            billable_hours,
            non_billable_hours: round2(total_hours - billable_hours),
        }
    }
}

fn seconds_to_hours(seconds: u64) -> Decimal {
    round2(Decimal::from(seconds) / Decimal::from(3600))
}

fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// Attaches employees to tracker totals by normalized e-mail. Sorted by tracker user id.
pub fn match_to_employees(
    totals: &HashMap<TrackerUserId, UserTotals>,
    users: &[TrackerUser],
    employees: &[Employee],
) -> Vec<TrackedHours> {
    let users: HashMap<TrackerUserId, &TrackerUser> = users.iter().map(|u| (u.id, u)).collect();
    let by_email: HashMap<String, &Employee> = employees
        .iter()
        .filter_map(|e| e.normalized_email().map(|email| (email, e)))
        .collect();

    let mut result: Vec<TrackedHours> = totals
        .iter()
        .map(|(user_id, totals)| {
            let user = users.get(user_id);
            let email = user.and_then(|u| normalize_email(u.email.as_deref()));
            let employee = email.as_ref().and_then(|e| by_email.get(e));
            let total_hours = seconds_to_hours(totals.total_seconds);
            let billable_hours = seconds_to_hours(totals.billable_seconds);
            TrackedHours {
                tracker_user_id: *user_id,
                employee_id: employee.map(|e| e.id.clone()),
                name: user
                    .and_then(|u| u.fullname.clone())
                    .or_else(|| employee.map(|e| e.full_name())),
                email,
                total_hours,
                billable_hours,
                non_billable_hours: round2(total_hours - billable_hours),
                projects: totals.project_names.clone(),
                clients: totals.client_names.clone(),
                project_breakdown: totals
                    .projects
                    .iter()
                    .map(|(id, project)| ProjectHours::from_totals(*id, project))
                    .collect(),
            }
        })
        .collect();
    result.sort_by_key(|t| t.tracker_user_id);
    result
}
