// src/schedule.rs
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::dates::{is_weekday, parse_local_date};
use crate::interval::day_hours_from_shifts;
use crate::model::{Employee, Schedule};

const WORKDAYS_PER_WEEK: u32 = 5;

#[derive(Debug)]
enum Basis<'a> {
    /// Sorted ascending by effective date.
    Effective(Vec<(NaiveDate, &'a Schedule)>),
    /// Employee has no usable schedule records; hours per Monday–Friday day.
    Weekly(Decimal),
}

/// Resolves scheduled hours for one employee on arbitrary dates.
#[derive(Debug)]
pub struct ScheduleResolver<'a> {
    basis: Basis<'a>,
    weekly_hours: Decimal,
}

impl<'a> ScheduleResolver<'a> {
    pub fn new(employee: &'a Employee, default_weekly_hours: Decimal) -> Self {
        // Zero is how upstream exports an unset value.
        let weekly_hours = employee
            .weekly_hours
            .filter(|hours| *hours > Decimal::ZERO)
            .unwrap_or(default_weekly_hours);

        let mut effective: Vec<(NaiveDate, &'a Schedule)> = employee
            .schedules
            .iter()
            .filter_map(|schedule| {
                let from = schedule.effective_from.as_deref().and_then(parse_local_date)?;
                Some((from, schedule))
            })
            .collect();
        // Stable, so of two records on the same date the later one listed wins.
        effective.sort_by_key(|(from, _)| *from);

        let basis = if effective.is_empty() {
            Basis::Weekly(weekly_hours / Decimal::from(WORKDAYS_PER_WEEK))
        } else {
            Basis::Effective(effective)
        };

        Self {
            basis,
            weekly_hours,
        }
    }

    pub fn weekly_hours(&self) -> Decimal {
        self.weekly_hours
    }

    pub fn uses_weekly_fallback(&self) -> bool {
        matches!(self.basis, Basis::Weekly(_))
    }

    /// The schedule in force on `date`: latest effective date not after it.
    pub fn schedule_for(&self, date: NaiveDate) -> Option<&'a Schedule> {
        match &self.basis {
            Basis::Effective(effective) => {
                let idx = effective.partition_point(|(from, _)| *from <= date);
                idx.checked_sub(1).map(|i| effective[i].1)
            }
            Basis::Weekly(_) => None,
        }
    }

    pub fn hours_for(&self, date: NaiveDate) -> Decimal {
        match &self.basis {
            Basis::Weekly(per_day) => {
                if is_weekday(date) {
                    *per_day
                } else {
                    Decimal::ZERO
                }
            }
            Basis::Effective(_) => {
                // A schedule in force with every day inactive still wins; no fallback.
                let Some(schedule) = self.schedule_for(date) else {
                    return Decimal::ZERO;
                };
                match schedule.day(date.weekday().num_days_from_sunday()) {
                    Some(day) if day.active => day_hours_from_shifts(&day.shift),
                    _ => Decimal::ZERO,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayConfig, Shift};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    fn schedule(from: Option<&str>, start: &str, end: &str, active_days: &[u32]) -> Schedule {
        let mut days = BTreeMap::new();
        for weekday in 0..7u32 {
            let config = DayConfig {
                active: active_days.contains(&weekday),
                shift: vec![Shift {
                    start: Some(start.to_string()),
                    end: Some(end.to_string()),
                }],
            };
            days.insert(weekday.to_string(), Some(config));
        }
        Schedule {
            effective_from: from.map(str::to_string),
            schedule_type: Some("weekly".into()),
            days: vec![days],
        }
    }

    fn employee(schedules: Vec<Schedule>, weekly_hours: Option<Decimal>) -> Employee {
        Employee {
            id: "emp-1".into(),
            first_name: None,
            last_name: None,
            email: None,
            department_id: None,
            location_id: None,
            team_ids: vec![],
            weekly_hours,
            schedules,
            employment_start_date: None,
            employment_end_date: None,
            active: true,
        }
    }

    const MON_FRI: &[u32] = &[1, 2, 3, 4, 5];

    #[test]
    fn test_latest_schedule_not_after_date_is_selected() {
        let emp = employee(
            vec![
                schedule(Some("2025-03-10"), "09:00", "13:00", MON_FRI),
                schedule(Some("2025-01-01T00:00:00.000Z"), "09:00", "17:00", MON_FRI),
            ],
            None,
        );
        let resolver = ScheduleResolver::new(&emp, dec!(40));
        assert_eq!(resolver.hours_for(d("2025-03-07")), dec!(8)); // Friday, first schedule
        assert_eq!(resolver.hours_for(d("2025-03-10")), dec!(4)); // Monday, revision starts
        assert_eq!(resolver.hours_for(d("2025-03-08")), dec!(0)); // Saturday
        assert_eq!(resolver.hours_for(d("2024-12-31")), dec!(0)); // before any schedule
    }

    #[test]
    fn test_selection_is_stable_between_revisions() {
        let emp = employee(
            vec![
                schedule(Some("2025-01-01"), "09:00", "17:00", MON_FRI),
                schedule(Some("2025-06-01"), "09:00", "12:00", MON_FRI),
            ],
            None,
        );
        let resolver = ScheduleResolver::new(&emp, dec!(40));
        let first = resolver.schedule_for(d("2025-01-02"));
        for day in ["2025-02-14", "2025-04-30", "2025-05-31"] {
            assert_eq!(resolver.schedule_for(d(day)), first, "{} should share a schedule", day);
        }
        assert_ne!(resolver.schedule_for(d("2025-06-01")), first);
    }

    #[test]
    fn test_all_inactive_schedule_in_force_yields_zero() {
        let emp = employee(
            vec![
                schedule(Some("2024-01-01"), "09:00", "17:00", MON_FRI),
                schedule(Some("2025-03-01"), "09:00", "17:00", &[]), // sabbatical
            ],
            Some(dec!(40)),
        );
        let resolver = ScheduleResolver::new(&emp, dec!(40));
        assert_eq!(resolver.hours_for(d("2025-03-12")), dec!(0));
        assert_eq!(resolver.hours_for(d("2025-02-12")), dec!(8));
    }

    #[test]
    fn test_future_only_schedule_does_not_fall_back_to_weekly_hours() {
        let emp = employee(
            vec![schedule(Some("2025-05-01"), "09:00", "17:00", MON_FRI)],
            Some(dec!(40)),
        );
        let resolver = ScheduleResolver::new(&emp, dec!(40));
        assert!(!resolver.uses_weekly_fallback());
        assert_eq!(resolver.hours_for(d("2025-03-12")), dec!(0));
    }

    #[test]
    fn test_weekly_fallback_when_no_dated_schedule_exists() {
        let emp = employee(
            vec![schedule(None, "09:00", "17:00", MON_FRI)],
            Some(dec!(30)),
        );
        let resolver = ScheduleResolver::new(&emp, dec!(40));
        assert!(resolver.uses_weekly_fallback());
        assert_eq!(resolver.hours_for(d("2025-03-12")), dec!(6));
        assert_eq!(resolver.hours_for(d("2025-03-15")), dec!(0));

        let defaulted = employee(vec![], None);
        let resolver = ScheduleResolver::new(&defaulted, dec!(40));
        assert_eq!(resolver.weekly_hours(), dec!(40));
        assert_eq!(resolver.hours_for(d("2025-03-12")), dec!(8));
    }

    #[test]
    fn test_zero_weekly_hours_uses_default() {
        let emp = employee(vec![], Some(dec!(0)));
        let resolver = ScheduleResolver::new(&emp, dec!(40));
        assert_eq!(resolver.weekly_hours(), dec!(40));
        assert_eq!(resolver.hours_for(d("2025-03-12")), dec!(8));
    }

    #[test]
    fn test_missing_day_entry_means_no_hours() {
        let mut sched = schedule(Some("2025-01-01"), "09:00", "17:00", MON_FRI);
        sched.days[0].remove("3");
        sched.days[0].insert("4".into(), None);
        let emp = employee(vec![sched], None);
        let resolver = ScheduleResolver::new(&emp, dec!(40));
        assert_eq!(resolver.hours_for(d("2025-03-12")), dec!(0)); // Wednesday
        assert_eq!(resolver.hours_for(d("2025-03-13")), dec!(0)); // Thursday
        assert_eq!(resolver.hours_for(d("2025-03-14")), dec!(8)); // Friday
    }
}
