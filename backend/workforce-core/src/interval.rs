// src/interval.rs
use rust_decimal::Decimal;

use crate::model::Shift;

/// Minutes since midnight for `HH:MM` or `HH:MM:SS`. Anything unparseable is 0.
pub fn parse_time_to_minutes(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };
    let mut parts = raw.trim().split(':');
    let hours = parts.next().and_then(|h| h.trim().parse::<i64>().ok());
    let minutes = parts.next().and_then(|m| m.trim().parse::<i64>().ok());
    match (hours, minutes) {
        (Some(24), Some(0)) => 24 * 60,
        (Some(h), Some(m)) if (0..24).contains(&h) && (0..60).contains(&m) => h * 60 + m,
        _ => 0,
    }
}

/// Elapsed minutes of one shift. Overnight shifts (end <= start) count as 0.
pub fn shift_minutes(shift: &Shift) -> i64 {
    let start = parse_time_to_minutes(shift.start.as_deref());
    let end = parse_time_to_minutes(shift.end.as_deref());
    (end - start).max(0)
}

/// Total hours across the shifts of one day.
pub fn day_hours_from_shifts(shifts: &[Shift]) -> Decimal {
    let minutes: i64 = shifts.iter().map(shift_minutes).sum();
    Decimal::from(minutes) / Decimal::from(60)
}
