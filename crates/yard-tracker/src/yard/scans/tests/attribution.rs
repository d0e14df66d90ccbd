use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use super::common::*;
use crate::yard::rules::YardRules;
use crate::yard::scans::{
    AttributionError, CarRecord, Placement, ScanAttributor, ScanLog, ScanValidationError,
};
use crate::yard::shift::ShiftId;
use crate::yard::status::Status;

fn attributor() -> ScanAttributor {
    ScanAttributor::new(Arc::new(YardRules::standard()))
}

#[test]
fn first_scan_of_unseen_car_is_new() {
    let log = MemoryLog::default();
    let outcome = attributor()
        .record_scan("ABC123", worker_ref(3, "Dana Reyes"), Placement::Parked, opening(), &log)
        .expect("scan recorded");

    assert!(outcome.is_new);
    assert!(outcome.previous_scans.is_empty());
    assert_eq!(outcome.car.scan_count, 1);
    assert_eq!(outcome.car.first_scan_time, outcome.car.last_scan_time);
    assert_eq!(outcome.event.shift, ShiftId(1));
    assert_eq!(log.all().len(), 1);
}

#[test]
fn repeat_scan_reports_previous_worker_and_time() {
    let log = MemoryLog::default();
    let attributor = attributor();
    attributor
        .record_scan("ABC123", worker_ref(3, "Dana Reyes"), Placement::Parked, opening(), &log)
        .expect("first scan");

    let second_at = opening() + Duration::minutes(25);
    let outcome = attributor
        .record_scan("abc123 ", worker_ref(4, "Lee Park"), Placement::Parked, second_at, &log)
        .expect("second scan");

    assert!(!outcome.is_new);
    assert_eq!(outcome.previous_scans.len(), 1);
    let previous = &outcome.previous_scans[0];
    assert_eq!(previous.worker_id.0, 3);
    assert_eq!(previous.worker, "Dana Reyes");
    assert_eq!(previous.scanned_at, opening());
    assert_eq!(previous.time_ago, "25 min ago");
    assert_eq!(outcome.car.scan_count, 2);
    assert_eq!(outcome.car.last_worker.name, "Lee Park");
}

#[test]
fn previous_scans_are_most_recent_first() {
    let log = MemoryLog::default();
    let attributor = attributor();
    for (offset, worker) in [(0, 3), (1, 4), (2, 5)] {
        attributor
            .record_scan(
                "CAR9",
                worker_ref(worker, "crew"),
                Placement::Parked,
                opening() + Duration::minutes(offset * 30),
                &log,
            )
            .expect("scan");
    }

    let outcome = attributor
        .record_scan("CAR9", worker_ref(6, "crew"), Placement::Parked, opening() + hours(2), &log)
        .expect("scan");
    let order: Vec<u64> = outcome
        .previous_scans
        .iter()
        .map(|scan| scan.worker_id.0)
        .collect();
    assert_eq!(order, vec![5, 4, 3]);
    assert_eq!(outcome.previous_scans[2].time_ago, "2h ago");
}

#[test]
fn history_is_append_only() {
    let log = MemoryLog::default();
    let attributor = attributor();
    let mut recorded = Vec::new();
    for step in 0..5 {
        let placement = if step % 2 == 0 {
            Placement::Parked
        } else {
            Placement::Holding {
                vessel_ref: Some("MV Aurora".to_string()),
                holding_area_ref: None,
                stack_number: None,
            }
        };
        let outcome = attributor
            .record_scan(
                "LOOP1",
                worker_ref(3, "Dana Reyes"),
                placement,
                opening() + Duration::minutes(step * 10),
                &log,
            )
            .expect("scan");
        recorded.push(outcome.event);
    }

    let (from, until) = YardRules::standard().window.bounds_containing(opening());
    let car = recorded[0].car_identifier.clone();
    let history = log.history(&car, from, until).expect("history");
    assert_eq!(history.len(), 5);
    assert_eq!(history, recorded);
}

#[test]
fn xyz1_status_progresses_from_last_scan() {
    let log = MemoryLog::default();
    let rules = YardRules::standard();
    let outcome = attributor()
        .record_scan("XYZ1", worker_ref(1, "W1"), Placement::Parked, opening(), &log)
        .expect("scan");
    let events = vec![outcome.event];

    let status_at = |offset: i64| {
        CarRecord::aggregate(&events, &rules, opening() + hours(offset))
            .expect("record")
            .status
    };
    assert_eq!(status_at(3), Status::Normal);
    assert_eq!(status_at(5), Status::Warning);
    assert_eq!(status_at(13), Status::Overdue);
}

#[test]
fn new_reporting_window_starts_fresh() {
    let log = MemoryLog::default();
    let attributor = attributor();
    let late = Utc.with_ymd_and_hms(2025, 3, 1, 23, 50, 0).unwrap();
    attributor
        .record_scan("NIGHT1", worker_ref(3, "crew"), Placement::Parked, late, &log)
        .expect("scan");

    let outcome = attributor
        .record_scan(
            "NIGHT1",
            worker_ref(3, "crew"),
            Placement::Parked,
            late + Duration::minutes(20),
            &log,
        )
        .expect("scan");
    assert!(outcome.is_new);
    assert_eq!(outcome.event.shift, ShiftId(5));
}

#[test]
fn invalid_identifiers_leave_the_log_untouched() {
    let log = MemoryLog::default();
    let error = attributor()
        .record_scan("   ", worker_ref(3, "crew"), Placement::Parked, opening(), &log)
        .expect_err("blank identifier rejected");
    assert!(matches!(
        error,
        AttributionError::Validation(ScanValidationError::EmptyIdentifier)
    ));
    assert!(log.all().is_empty());
}

#[test]
fn holding_scan_stores_trimmed_attributes() {
    let log = MemoryLog::default();
    let outcome = attributor()
        .record_scan(
            "HLD1",
            worker_ref(3, "crew"),
            Placement::Holding {
                vessel_ref: Some(" MV Aurora ".to_string()),
                holding_area_ref: Some(String::new()),
                stack_number: Some("12".to_string()),
            },
            opening(),
            &log,
        )
        .expect("scan");

    assert!(outcome.car.is_in_holding);
    assert_eq!(
        outcome.event.placement,
        Placement::Holding {
            vessel_ref: Some("MV Aurora".to_string()),
            holding_area_ref: None,
            stack_number: Some("12".to_string()),
        }
    );
}

#[test]
fn backfilled_scan_ignores_later_events() {
    let log = MemoryLog::default();
    let attributor = attributor();
    attributor
        .record_scan(
            "LATE7",
            worker_ref(4, "Lee Park"),
            Placement::Parked,
            opening() + hours(1),
            &log,
        )
        .expect("later scan");

    let backfill = attributor
        .record_scan("LATE7", worker_ref(3, "Dana Reyes"), Placement::Parked, opening(), &log)
        .expect("backfilled scan");
    assert!(backfill.is_new);
    assert!(backfill.previous_scans.is_empty());
    assert_eq!(backfill.car.scan_count, 1);
    assert_eq!(backfill.car.last_worker.name, "Dana Reyes");
    assert_eq!(log.all().len(), 2);

    let next = attributor
        .record_scan(
            "LATE7",
            worker_ref(5, "crew"),
            Placement::Parked,
            opening() + hours(2),
            &log,
        )
        .expect("scan after both");
    let workers: Vec<u64> = next.previous_scans.iter().map(|scan| scan.worker_id.0).collect();
    assert_eq!(workers, vec![4, 3]);
}
