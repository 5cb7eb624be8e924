// src/aggregator.rs
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::calendar::{employment_period, AbsenceLedger, HolidayCalendar, MonthHolidays};
use crate::dates::{days_between, is_weekday, round2};
use crate::model::{
    AbsenceRecord, Department, Employee, Holiday, Location, MonthlySummary, Reason, Team,
    WorkedHours,
};
use crate::reasons::ReasonBook;
use crate::schedule::ScheduleResolver;

/// Everything needed to summarize one month. Borrowed, so one metadata
/// bundle can serve many months.
#[derive(Debug, Clone, Copy)]
pub struct MonthInputs<'a> {
    pub employees: &'a [Employee],
    pub absences: &'a [AbsenceRecord],
    pub holidays: &'a [Holiday],
    pub reasons: &'a [Reason],
    pub locations: &'a [Location],
    pub teams: &'a [Team],
    pub departments: &'a [Department],
    pub worked_hours: &'a WorkedHours,
}

/// Scheduled hours and working days over the employment period of the month.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScheduledTime {
    pub hours: Decimal,
    pub working_days: u32,
}

pub fn scheduled_time(
    resolver: &ScheduleResolver<'_>,
    period: Option<(NaiveDate, NaiveDate)>,
    holidays: &BTreeSet<NaiveDate>,
    absences: &BTreeSet<NaiveDate>,
) -> ScheduledTime {
    let Some((start, end)) = period else {
        return ScheduledTime::default();
    };
    let mut result = ScheduledTime::default();
    // A date in both sets is skipped once.
    let included = |day: &NaiveDate| !holidays.contains(day) && !absences.contains(day);
    for day in days_between(start, end).filter(included) {
        result.hours += resolver.hours_for(day);
        if is_weekday(day) {
            result.working_days += 1;
        }
    }
    result.hours = round2(result.hours);
    result
}

pub struct MonthlyAggregator<'a> {
    inputs: MonthInputs<'a>,
    reasons: ReasonBook,
    calendar: HolidayCalendar<'a>,
    default_weekly_hours: Decimal,
}

impl<'a> MonthlyAggregator<'a> {
    pub fn new(inputs: MonthInputs<'a>, default_weekly_hours: Decimal) -> Self {
        Self {
            reasons: ReasonBook::new(inputs.reasons),
            calendar: HolidayCalendar::new(inputs.holidays, inputs.locations),
            inputs,
            default_weekly_hours,
        }
    }

    /// One summary per active employee, in upstream order.
    pub fn summarize(&self, year: i32, month: u32) -> Vec<MonthlySummary> {
        let mut absences_by_employee: HashMap<&str, Vec<&AbsenceRecord>> = HashMap::new();
        for record in self.inputs.absences {
            absences_by_employee
                .entry(record.employee_id.as_str())
                .or_default()
                .push(record);
        }

        let mut holidays_by_location: HashMap<Option<&str>, MonthHolidays> = HashMap::new();
        let mut summaries = Vec::new();

        for employee in self.inputs.employees.iter().filter(|e| e.active) {
            let location_id = employee.location_id.as_deref();
            let holidays = holidays_by_location
                .entry(location_id)
                .or_insert_with(|| self.calendar.for_month(location_id, year, month));
            let records = absences_by_employee
                .get(employee.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            summaries.push(self.summarize_employee(employee, records, holidays, year, month));
        }

        debug!(
            "Summarized {} active employees for {}-{:02}",
            summaries.len(),
            year,
            month
        );
        summaries
    }

    fn summarize_employee(
        &self,
        employee: &Employee,
        records: &[&AbsenceRecord],
        holidays: &MonthHolidays,
        year: i32,
        month: u32,
    ) -> MonthlySummary {
        let ledger = AbsenceLedger::build(
            records.iter().copied(),
            &self.reasons,
            &holidays.working_day_dates,
            year,
            month,
        );
        let resolver = ScheduleResolver::new(employee, self.default_weekly_hours);
        let period = employment_period(employee, year, month);
        let scheduled = scheduled_time(
            &resolver,
            period,
            &holidays.working_day_dates,
            &ledger.excluded_dates,
        );

        let worked_hours = round2(
            self.inputs
                .worked_hours
                .get(&employee.id)
                .copied()
                .unwrap_or_default(),
        );
        let overtime_hours = round2(worked_hours - scheduled.hours);

        let (team_ids, team_names) = self.teams_of(employee);
        let location = employee
            .location_id
            .as_deref()
            .and_then(|id| self.inputs.locations.iter().find(|l| l.id == id));
        let department_name = employee.department_id.as_deref().and_then(|id| {
            self.inputs
                .departments
                .iter()
                .find(|d| d.id == id)
                .and_then(|d| d.name.clone())
        });

        MonthlySummary {
            employee_id: employee.id.clone(),
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            full_name: employee.full_name(),
            email: employee.email.clone(),
            department_id: employee.department_id.clone(),
            department_name,
            location_id: employee.location_id.clone(),
            location_name: location.and_then(|l| l.name.clone()),
            team_ids,
            team_names,
            year,
            month,
            weekly_hours: resolver.weekly_hours(),
            scheduled_hours: scheduled.hours,
            worked_hours,
            overtime_hours,
            working_days: scheduled.working_days,
            absence_days: round2(ledger.absence_days),
            absence_count: ledger.absence_count,
            mobile_work_days: round2(ledger.mobile_work_days),
            holiday_count: holidays.working_day_count(),
        }
    }

    /// Union of the employee's own team ids and teams listing the employee.
    fn teams_of(&self, employee: &Employee) -> (Vec<String>, Vec<String>) {
        let mut ids = employee.team_ids.clone();
        let mut names = Vec::new();
        for team in self.inputs.teams {
            let listed = team.member_ids.iter().any(|m| *m == employee.id);
            if !listed && !employee.team_ids.contains(&team.id) {
                continue;
            }
            if !ids.contains(&team.id) {
                ids.push(team.id.clone());
            }
            if let Some(name) = &team.name {
                names.push(name.clone());
            }
        }
        (ids, names)
    }
}
