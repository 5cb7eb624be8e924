// src/engine_tests.rs
//! End-to-end scenarios through `SummaryEngine` with in-memory collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

use crate::cached_source::{CachedTimeTracking, CachedWorkforce};
use crate::config::EngineConfig;
use crate::engine::SummaryEngine;
use crate::error::{SummaryError, Upstream, UpstreamError};
use crate::model::{AbsenceRecord, Employee, Holiday, Reason, WorkedHours};
use crate::snapshot::{SnapshotSource, ABSENCES_FILE, EMPLOYEES_FILE, REASONS_FILE};
use crate::source::{TimeTrackingSource, WorkforceSource};
use crate::tracked::{SummaryReport, TrackerClient, TrackerProject, TrackerUser};

// --- Fakes ---

#[derive(Default)]
struct FakeWorkforce {
    employees: Mutex<Vec<Employee>>,
    absences: Mutex<Vec<AbsenceRecord>>,
    holidays: Mutex<Vec<Holiday>>,
    reasons: Mutex<Vec<Reason>>,
    worked: Mutex<WorkedHours>,
    fail_holidays: AtomicBool,
    employee_calls: AtomicUsize,
    holiday_calls: AtomicUsize,
}

#[async_trait]
impl WorkforceSource for Arc<FakeWorkforce> {
    async fn fetch_employees(&self) -> Result<Vec<Employee>, UpstreamError> {
        self.employee_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(self.employees.lock().unwrap().clone())
    }

    async fn fetch_approved_absences(
        &self,
        _year: i32,
        _month: u32,
    ) -> Result<Vec<AbsenceRecord>, UpstreamError> {
        Ok(self.absences.lock().unwrap().clone())
    }

    async fn fetch_worked_hours(
        &self,
        _year: i32,
        _month: u32,
    ) -> Result<WorkedHours, UpstreamError> {
        Ok(self.worked.lock().unwrap().clone())
    }

    async fn fetch_holidays(&self) -> Result<Vec<Holiday>, UpstreamError> {
        self.holiday_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_holidays.load(Ordering::SeqCst) {
            return Err(UpstreamError::Api {
                upstream: Upstream::Workforce,
                status: 503,
                message: "maintenance".into(),
            });
        }
        Ok(self.holidays.lock().unwrap().clone())
    }

    async fn fetch_reasons(&self) -> Result<Vec<Reason>, UpstreamError> {
        Ok(self.reasons.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeTracker {
    quota_exhausted: AtomicBool,
    summary_calls: AtomicUsize,
}

#[async_trait]
impl TimeTrackingSource for Arc<FakeTracker> {
    async fn fetch_users(&self) -> Result<Vec<TrackerUser>, UpstreamError> {
        Ok(vec![TrackerUser {
            id: 1,
            email: Some("ada@example.com".into()),
            fullname: Some("Ada Lovelace".into()),
        }])
    }

    async fn fetch_projects(&self) -> Result<Vec<TrackerProject>, UpstreamError> {
        Ok(vec![])
    }

    async fn fetch_clients(&self) -> Result<Vec<TrackerClient>, UpstreamError> {
        Ok(vec![])
    }

    async fn fetch_summary_report(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<SummaryReport, UpstreamError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        if self.quota_exhausted.load(Ordering::SeqCst) {
            return Err(UpstreamError::QuotaExhausted {
                upstream: Upstream::TimeTracking,
                message: "hourly quota reached".into(),
            });
        }
        Ok(serde_json::from_str(
            r#"{"groups": [{"id": 1, "sub_groups": [{"id": 5, "seconds": 36000}]}]}"#,
        )
        .unwrap())
    }
}

// --- Builders ---

fn nine_to_five_employee(id: &str, effective_from: &str) -> Employee {
    let json = format!(
        r#"{{
            "id": "{id}",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "locationId": "berlin",
            "weeklyHours": 40,
            "schedules": [{{
                "effectiveFrom": "{effective_from}",
                "days": [{{
                    "0": {{ "active": false, "shift": [] }},
                    "1": {{ "active": true, "shift": [{{ "start": "09:00", "end": "17:00" }}] }},
                    "2": {{ "active": true, "shift": [{{ "start": "09:00", "end": "17:00" }}] }},
                    "3": {{ "active": true, "shift": [{{ "start": "09:00", "end": "17:00" }}] }},
                    "4": {{ "active": true, "shift": [{{ "start": "09:00", "end": "17:00" }}] }},
                    "5": {{ "active": true, "shift": [{{ "start": "09:00", "end": "17:00" }}] }},
                    "6": {{ "active": false, "shift": [] }}
                }}]
            }}]
        }}"#
    );
    serde_json::from_str(&json).expect("valid employee json")
}

fn vacation_reason() -> Reason {
    Reason {
        id: "vacation".into(),
        name: Some("Urlaub".into()),
        counts_as_work: Some(false),
        reduces_days: Some(true),
    }
}

fn vacation_on(employee_id: &str, date: &str) -> AbsenceRecord {
    serde_json::from_value(serde_json::json!({
        "id": format!("abs-{}", date),
        "assignedToId": employee_id,
        "reasonId": "vacation",
        "start": format!("{}T00:00:00.000Z", date),
        "end": format!("{}T00:00:00.000Z", date),
        "days": [{
            "date": format!("{}T00:00:00.000Z", date),
            "value": 1,
            "holiday": false,
            "weekend": false
        }],
        "status": 2
    }))
    .expect("valid absence json")
}

fn holiday_on(date: &str) -> Holiday {
    Holiday {
        id: format!("h-{}", date),
        name: Some("Holiday".into()),
        dates: vec![date.to_string()],
        location_ids: vec![],
    }
}

fn fake_with(employees: Vec<Employee>) -> Arc<FakeWorkforce> {
    let fake = Arc::new(FakeWorkforce::default());
    *fake.employees.lock().unwrap() = employees;
    *fake.reasons.lock().unwrap() = vec![vacation_reason()];
    fake
}

fn direct_engine(fake: &Arc<FakeWorkforce>) -> SummaryEngine {
    SummaryEngine::new(Arc::new(Arc::clone(fake)), EngineConfig::default())
}

fn cached_engine(fake: &Arc<FakeWorkforce>, config: EngineConfig) -> SummaryEngine {
    let cached = CachedWorkforce::new(Arc::clone(fake), config.clone());
    SummaryEngine::new(Arc::new(cached), config)
}

// --- Scenarios ---

#[tokio::test(start_paused = true)]
async fn test_full_time_schedule_march_2025() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-01-01T00:00:00.000Z")]);
    let summaries = direct_engine(&fake)
        .generate_monthly_summary(2025, 3, None)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].scheduled_hours, dec!(168.00));
    assert_eq!(summaries[0].working_days, 21);
    assert_eq!(summaries[0].overtime_hours, dec!(-168.00));
}

#[tokio::test(start_paused = true)]
async fn test_wednesday_vacation_reduces_schedule() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-01-01")]);
    *fake.absences.lock().unwrap() = vec![vacation_on("e1", "2025-03-12")];
    let summaries = direct_engine(&fake)
        .generate_monthly_summary(2025, 3, None)
        .await
        .unwrap();
    assert_eq!(summaries[0].scheduled_hours, dec!(160.00));
    assert_eq!(summaries[0].absence_days, dec!(1));
    assert_eq!(summaries[0].absence_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_starting_in_future_yields_zero() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-05-01")]);
    let summaries = direct_engine(&fake)
        .generate_monthly_summary(2025, 3, None)
        .await
        .unwrap();
    assert_eq!(summaries[0].scheduled_hours, dec!(0));
}

#[tokio::test(start_paused = true)]
async fn test_employment_ended_before_month_yields_zero() {
    let mut employee: Employee = serde_json::from_str(
        r#"{"id": "e1", "weeklyHours": 40, "employmentEndDate": "2025-02-28"}"#,
    )
    .unwrap();
    let fake = fake_with(vec![employee.clone()]);
    let summaries = direct_engine(&fake)
        .generate_monthly_summary(2025, 3, None)
        .await
        .unwrap();
    assert_eq!(summaries[0].scheduled_hours, dec!(0));
    assert_eq!(summaries[0].working_days, 0);

    employee.employment_end_date = Some("2025-03-14".into());
    *fake.employees.lock().unwrap() = vec![employee];
    let summaries = direct_engine(&fake)
        .generate_monthly_summary(2025, 3, None)
        .await
        .unwrap();
    assert_eq!(summaries[0].scheduled_hours, dec!(80));
}

#[tokio::test(start_paused = true)]
async fn test_holiday_and_absence_on_same_day_excluded_once() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-01-01")]);
    *fake.absences.lock().unwrap() = vec![vacation_on("e1", "2025-03-12")];
    *fake.holidays.lock().unwrap() = vec![holiday_on("2025-03-12")];
    let summaries = direct_engine(&fake)
        .generate_monthly_summary(2025, 3, None)
        .await
        .unwrap();
    assert_eq!(summaries[0].scheduled_hours, dec!(160.00));
    assert_eq!(summaries[0].holiday_count, 1);
    assert_eq!(summaries[0].absence_days, dec!(0));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_aggregation_is_identical() {
    let fake = fake_with(vec![
        nine_to_five_employee("e1", "2025-01-01"),
        nine_to_five_employee("e2", "2024-06-01"),
    ]);
    *fake.absences.lock().unwrap() = vec![vacation_on("e2", "2025-03-04")];
    *fake.holidays.lock().unwrap() = vec![holiday_on("2025-03-21")];
    *fake.worked.lock().unwrap() = WorkedHours::from([("e1".to_string(), dec!(170.456))]);
    let engine = direct_engine(&fake);

    let first = engine.generate_monthly_summary(2025, 3, None).await.unwrap();
    let second = engine.generate_monthly_summary(2025, 3, None).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first[0].worked_hours, dec!(170.46));
    assert_eq!(first[0].overtime_hours, dec!(10.46));
}

#[tokio::test(start_paused = true)]
async fn test_inactive_employees_are_skipped() {
    let mut inactive = nine_to_five_employee("e2", "2025-01-01");
    inactive.active = false;
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-01-01"), inactive]);
    let engine = direct_engine(&fake);

    let summaries = engine.generate_monthly_summary(2025, 3, None).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert!(engine
        .get_employee_monthly_summary("e1", 2025, 3)
        .await
        .unwrap()
        .is_some());
    assert!(engine
        .get_employee_monthly_summary("e2", 2025, 3)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_null_fields_and_bad_records_do_not_abort_the_batch() {
    let dir = std::env::temp_dir().join(format!("workforce-engine-nulls-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let scheduled = serde_json::to_value(nine_to_five_employee("e1", "2025-01-01")).unwrap();
    let employees = serde_json::json!([
        scheduled,
        { "id": "e2", "weeklyHours": 40, "schedules": null, "teamIds": null },
        { "firstName": "Missing", "lastName": "Id" }
    ]);
    std::fs::write(dir.join(EMPLOYEES_FILE), employees.to_string()).unwrap();
    std::fs::write(
        dir.join(ABSENCES_FILE),
        r#"[{"id": "a1", "userId": "e1", "reasonId": "vacation", "start": "2025-03-12", "end": "2025-03-12", "days": null, "status": 2}]"#,
    )
    .unwrap();
    std::fs::write(dir.join(REASONS_FILE), serde_json::to_string(&[vacation_reason()]).unwrap())
        .unwrap();

    let engine = SummaryEngine::new(Arc::new(SnapshotSource::new(&dir)), EngineConfig::default());
    let summaries = engine.generate_monthly_summary(2025, 3, None).await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].employee_id, "e1");
    assert_eq!(summaries[0].scheduled_hours, dec!(160));
    assert_eq!(summaries[0].absence_count, 1);
    assert_eq!(summaries[1].employee_id, "e2");
    assert_eq!(summaries[1].scheduled_hours, dec!(168));
}

#[tokio::test]
async fn test_invalid_month_is_rejected() {
    let fake = fake_with(vec![]);
    let result = direct_engine(&fake).generate_monthly_summary(2025, 13, None).await;
    assert!(matches!(
        result,
        Err(SummaryError::InvalidPeriod { year: 2025, month: 13 })
    ));
}

// --- Resilience ---

#[tokio::test(start_paused = true)]
async fn test_stale_holidays_served_when_upstream_fails() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-01-01")]);
    *fake.holidays.lock().unwrap() = vec![holiday_on("2025-03-12")];
    let engine = cached_engine(&fake, EngineConfig::default());

    let fresh = engine.generate_monthly_summary(2025, 3, None).await.unwrap();
    assert_eq!(fresh[0].scheduled_hours, dec!(160));

    tokio::time::advance(Duration::from_secs(2 * 24 * 60 * 60)).await;
    fake.fail_holidays.store(true, Ordering::SeqCst);
    let stale = engine.generate_monthly_summary(2025, 3, None).await.unwrap();
    assert_eq!(stale[0].scheduled_hours, dec!(160));
    assert_eq!(stale[0].holiday_count, 1);
    assert_eq!(fake.holiday_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_holiday_failure_without_cache_names_upstream() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-01-01")]);
    fake.fail_holidays.store(true, Ordering::SeqCst);
    let result = cached_engine(&fake, EngineConfig::default())
        .generate_monthly_summary(2025, 3, None)
        .await;
    match result {
        Err(SummaryError::Upstream(err)) => {
            assert_eq!(err.upstream(), Some(Upstream::Workforce));
            assert!(err.to_string().contains("workforce"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_months_share_metadata_fetch() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-01-01")]);
    let engine = cached_engine(&fake, EngineConfig::default());
    let (march, april) = tokio::join!(
        engine.generate_monthly_summary(2025, 3, None),
        engine.generate_monthly_summary(2025, 4, None),
    );
    assert_eq!(march.unwrap()[0].scheduled_hours, dec!(168));
    assert_eq!(april.unwrap()[0].scheduled_hours, dec!(176));
    assert_eq!(fake.employee_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.holiday_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_quota_exhaustion_fails_fast_without_upstream_call() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2025-01-01")]);
    let tracker = Arc::new(FakeTracker::default());
    tracker.quota_exhausted.store(true, Ordering::SeqCst);
    let config = EngineConfig::default();
    let engine = direct_engine(&fake).with_time_tracking(Arc::new(CachedTimeTracking::new(
        Arc::clone(&tracker),
        config,
    )));

    let first = engine.tracked_hours(2024, 1, None).await;
    assert!(matches!(
        first,
        Err(SummaryError::Upstream(UpstreamError::QuotaExhausted { .. }))
    ));

    tokio::time::advance(Duration::from_secs(5 * 60)).await;
    let second = engine.tracked_hours(2024, 2, None).await;
    let err = second.expect_err("circuit should be open");
    // The employee fetch before the check sleeps 50ms on the paused clock.
    let remaining = err.retry_after().expect("open circuit reports remaining time");
    assert!(remaining > Duration::from_secs(599) && remaining <= Duration::from_secs(600));
    assert_eq!(tracker.summary_calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(10 * 60)).await;
    tracker.quota_exhausted.store(false, Ordering::SeqCst);
    let recovered = engine.tracked_hours(2024, 2, None).await.unwrap();
    assert_eq!(recovered[0].employee_id.as_deref(), Some("e1"));
    assert_eq!(recovered[0].total_hours, dec!(10));
    let breakdown = &recovered[0].project_breakdown;
    assert_eq!(breakdown.len(), 1);
    assert_eq!(breakdown[0].project_id, Some(5));
    assert_eq!(breakdown[0].project_name, "Project 5");
    assert_eq!(breakdown[0].client_name, "No Client");
    assert_eq!(breakdown[0].non_billable_hours, dec!(10));
}

#[tokio::test(start_paused = true)]
async fn test_period_report_covers_every_month() {
    let fake = fake_with(vec![nine_to_five_employee("e1", "2024-01-01")]);
    let tracker = Arc::new(FakeTracker::default());
    let config = EngineConfig::default();
    let engine = cached_engine(&fake, config.clone())
        .with_time_tracking(Arc::new(CachedTimeTracking::new(Arc::clone(&tracker), config)));

    let report = engine.generate_period_report(2024, 2024).await.unwrap();
    assert_eq!(report.summaries.len(), 12);
    assert!(report
        .summaries
        .windows(2)
        .all(|w| w[0].month < w[1].month));
    assert_eq!(report.tracked.len(), 12);
    assert_eq!(tracker.summary_calls.load(Ordering::SeqCst), 12);
    assert_eq!(fake.employee_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_period_report_range_is_bounded() {
    let fake = fake_with(vec![]);
    let engine = direct_engine(&fake);
    assert!(matches!(
        engine.generate_period_report(2019, 2025).await,
        Err(SummaryError::RangeTooLarge { max_years: 5, .. })
    ));
    assert!(matches!(
        engine.generate_period_report(2025, 2024).await,
        Err(SummaryError::RangeTooLarge { .. })
    ));
    assert!(matches!(
        engine.generate_period_report(i32::MIN, i32::MAX).await,
        Err(SummaryError::RangeTooLarge { .. })
    ));
}
