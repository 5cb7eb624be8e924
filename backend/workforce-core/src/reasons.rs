// src/reasons.rs
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Reason;

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .filter_map(|src| Regex::new(&format!("(?i){}", src)).ok())
        .collect()
}

static MOBILE_WORK: Lazy<Vec<Regex>> = Lazy::new(|| {
    patterns(&[
        r"mobiles?\s*arbeiten",
        r"remote\s*work",
        r"home\s*office",
        r"work\s*from\s*home",
    ])
});

// Markers for presence, matched on the whole name.
static WORK_MARKER: Lazy<Vec<Regex>> =
    Lazy::new(|| patterns(&[r"^arbeit$", r"^abwesend$", r"^abwesenheit$"]));

static COMPENSATION: Lazy<Vec<Regex>> =
    Lazy::new(|| patterns(&[r"überstunden", r"compensation", r"ausgleich"]));

static SICK_LEAVE: Lazy<Vec<Regex>> =
    Lazy::new(|| patterns(&[r"krankheit", r"sick", r"illness", r"krank"]));

fn matches_any(set: &[Regex], name: &str) -> bool {
    set.iter().any(|re| re.is_match(name))
}

/// Derived view of an absence reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReasonClassification {
    pub is_mobile_work: bool,
    pub is_sick_leave: bool,
    pub is_work_marker: bool,
    pub is_compensation: bool,
    /// Reported in the absence-days column.
    pub is_absence: bool,
    /// Removed from the scheduled-hours pool.
    pub reduces_scheduled_hours: bool,
}

impl ReasonClassification {
    pub fn classify(reason: &Reason) -> Self {
        let name = reason.name.as_deref().unwrap_or_default().trim();
        let named = !name.is_empty();
        let is_mobile_work = named && matches_any(&MOBILE_WORK, name);
        let is_work_marker = named && matches_any(&WORK_MARKER, name);
        let is_compensation = named && matches_any(&COMPENSATION, name);
        let is_sick_leave = named && matches_any(&SICK_LEAVE, name);

        let reduces_days = reason.reduces_days == Some(true);
        let is_absence = (reduces_days || is_sick_leave)
            && !is_mobile_work
            && !is_work_marker
            && !is_compensation
            && reason.counts_as_work != Some(true);

        Self {
            is_mobile_work,
            is_sick_leave,
            is_work_marker,
            is_compensation,
            is_absence,
            reduces_scheduled_hours: reason.counts_as_work == Some(false),
        }
    }
}

/// Lookup by reason id. Unknown ids classify as neither absence nor reducing.
#[derive(Debug, Clone, Default)]
pub struct ReasonBook {
    by_id: HashMap<String, ReasonClassification>,
}

impl ReasonBook {
    pub fn new(reasons: &[Reason]) -> Self {
        let by_id = reasons
            .iter()
            .map(|r| (r.id.clone(), ReasonClassification::classify(r)))
            .collect();
        Self { by_id }
    }

    pub fn get(&self, reason_id: Option<&str>) -> Option<ReasonClassification> {
        reason_id.and_then(|id| self.by_id.get(id)).copied()
    }

    pub fn classify(&self, reason_id: Option<&str>) -> ReasonClassification {
        self.get(reason_id).unwrap_or_default()
    }
}
