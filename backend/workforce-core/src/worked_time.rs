// src/worked_time.rs
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::dates::{month_end, month_start, round2};
use crate::model::{EmployeeId, WorkedHours};

/// One tracked interval from the workforce system.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Timespan {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "userId")]
    pub employee_id: EmployeeId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// "work" or "break". Missing means work.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl Timespan {
    pub fn is_work(&self) -> bool {
        self.kind.as_deref().map_or(true, |kind| kind == "work")
    }

    /// Whole seconds of this span inside `[from, to)`.
    pub fn seconds_within(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
        let start = self.start.max(from);
        let end = self.end.min(to);
        (end - start).num_seconds().max(0)
    }
}

/// `[first instant of the month, first instant of the next month)` in UTC.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = month_start(year, month)?;
    let next = month_end(year, month)?.succ_opt()?;
    let at_midnight = |date: NaiveDate| date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    Some((at_midnight(start)?, at_midnight(next)?))
}

/// Work hours per employee with each span clipped to the month.
pub fn sum_work_hours(timespans: &[Timespan], year: i32, month: u32) -> WorkedHours {
    let mut totals = WorkedHours::new();
    let Some((from, to)) = month_bounds(year, month) else {
        return totals;
    };
    for span in timespans.iter().filter(|s| s.is_work()) {
        let seconds = span.seconds_within(from, to);
        if seconds == 0 {
            continue;
        }
        *totals.entry(span.employee_id.clone()).or_default() +=
            Decimal::from(seconds) / Decimal::from(3600);
    }
    for hours in totals.values_mut() {
        *hours = round2(*hours);
    }
    totals
}
