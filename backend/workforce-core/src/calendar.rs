// src/calendar.rs
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::dates::{days_between, is_in_month, is_weekday, month_end, month_start, parse_local_date};
use crate::model::{AbsenceRecord, Employee, Holiday, Location};
use crate::reasons::ReasonBook;

// --- Holidays ---

/// Holiday occurrences of one month for one location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthHolidays {
    /// Distinct Monday–Friday dates; these are excluded from scheduled hours.
    pub working_day_dates: BTreeSet<NaiveDate>,
    /// All occurrences in the month, weekends included.
    pub total_count: usize,
}

impl MonthHolidays {
    pub fn working_day_count(&self) -> u32 {
        self.working_day_dates.len() as u32
    }
}

pub struct HolidayCalendar<'a> {
    holidays: &'a [Holiday],
    locations: HashMap<&'a str, &'a Location>,
}

impl<'a> HolidayCalendar<'a> {
    pub fn new(holidays: &'a [Holiday], locations: &'a [Location]) -> Self {
        let locations = locations.iter().map(|l| (l.id.as_str(), l)).collect();
        Self {
            holidays,
            locations,
        }
    }

    /// A location with an explicit holiday list takes holidays listed there or
    /// scoped to it. Otherwise unscoped holidays apply everywhere. Without a
    /// location only unscoped holidays apply.
    fn applies_to(&self, holiday: &Holiday, location_id: Option<&str>) -> bool {
        let Some(location_id) = location_id else {
            return holiday.location_ids.is_empty();
        };
        let scoped_here = holiday.location_ids.iter().any(|id| id == location_id);
        match self.locations.get(location_id) {
            Some(location) if !location.holiday_ids.is_empty() => {
                scoped_here || location.holiday_ids.contains(&holiday.id)
            }
            _ => scoped_here || holiday.location_ids.is_empty(),
        }
    }

    pub fn for_month(&self, location_id: Option<&str>, year: i32, month: u32) -> MonthHolidays {
        let mut result = MonthHolidays::default();
        for holiday in self.holidays {
            if !self.applies_to(holiday, location_id) {
                continue;
            }
            for date in holiday.dates.iter().filter_map(|raw| parse_local_date(raw)) {
                if !is_in_month(date, year, month) {
                    continue;
                }
                result.total_count += 1;
                if is_weekday(date) {
                    result.working_day_dates.insert(date);
                }
            }
        }
        result
    }
}

// --- Absences ---

/// Per-employee absence totals for one month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbsenceLedger {
    /// Days removed from the scheduled-hours pool. Never overlaps the holiday set.
    pub excluded_dates: BTreeSet<NaiveDate>,
    pub absence_days: Decimal,
    pub absence_count: u32,
    pub mobile_work_days: Decimal,
    pub mobile_work_count: u32,
}

/// Days of a record that land on a working day of the month, with the fraction taken.
fn qualifying_days(
    record: &AbsenceRecord,
    year: i32,
    month: u32,
    holidays: &BTreeSet<NaiveDate>,
) -> Vec<(NaiveDate, Decimal)> {
    if !record.days.is_empty() {
        return record
            .days
            .iter()
            .filter(|day| day.is_working_day())
            .filter_map(|day| {
                let date = day.date.as_deref().and_then(parse_local_date)?;
                Some((date, day.value))
            })
            .filter(|(date, _)| is_in_month(*date, year, month) && !holidays.contains(date))
            .collect();
    }

    let start = record.start.as_deref().and_then(parse_local_date);
    let end = record.end.as_deref().and_then(parse_local_date);
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };
    days_between(start, end)
        .filter(|date| is_in_month(*date, year, month))
        .filter(|date| is_weekday(*date) && !holidays.contains(date))
        .map(|date| (date, Decimal::ONE))
        .collect()
}

impl AbsenceLedger {
    /// Folds one employee's records for the month. Unapproved records and
    /// records with an unknown reason are ignored.
    pub fn build<'r>(
        records: impl IntoIterator<Item = &'r AbsenceRecord>,
        reasons: &ReasonBook,
        holidays: &BTreeSet<NaiveDate>,
        year: i32,
        month: u32,
    ) -> Self {
        let mut ledger = AbsenceLedger::default();

        for record in records {
            if !record.is_approved() {
                continue;
            }
            let Some(reason) = reasons.get(record.reason_id.as_deref()) else {
                debug!(
                    "Absence {} has unknown reason {:?}, skipping",
                    record.id, record.reason_id
                );
                continue;
            };

            if reason.is_mobile_work {
                ledger.mobile_work_days += if record.days.is_empty() {
                    record.days_count.unwrap_or_default()
                } else {
                    qualifying_days(record, year, month, holidays)
                        .iter()
                        .map(|(_, value)| *value)
                        .sum()
                };
                ledger.mobile_work_count += 1;
                continue;
            }

            if !reason.reduces_scheduled_hours && !reason.is_absence {
                continue;
            }

            let days = qualifying_days(record, year, month, holidays);
            if reason.reduces_scheduled_hours {
                ledger.excluded_dates.extend(days.iter().map(|(date, _)| *date));
            }
            if reason.is_absence {
                ledger.absence_days += days.iter().map(|(_, value)| *value).sum::<Decimal>();
                ledger.absence_count += 1;
            }
        }

        ledger
    }
}

// --- Employment ---

/// `[max(month start, employment start), min(month end, employment end)]`,
/// or `None` when the employee was not employed during the month.
pub fn employment_period(
    employee: &Employee,
    year: i32,
    month: u32,
) -> Option<(NaiveDate, NaiveDate)> {
    let mut start = month_start(year, month)?;
    let mut end = month_end(year, month)?;
    if let Some(hired) = employee.employment_start_date.as_deref().and_then(parse_local_date) {
        start = start.max(hired);
    }
    if let Some(left) = employee.employment_end_date.as_deref().and_then(parse_local_date) {
        end = end.min(left);
    }
    (start <= end).then_some((start, end))
}
