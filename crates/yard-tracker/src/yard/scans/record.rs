use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::domain::{CarIdentifier, Location, Placement, ScanEvent};
use crate::yard::rules::YardRules;
use crate::yard::shift::ShiftId;
use crate::yard::status::Status;
use crate::yard::users::{UserId, WorkerRef};

/// Per-car view aggregated on read from the scan events of one reporting window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarRecord {
    pub car_identifier: CarIdentifier,
    pub first_scan_time: DateTime<Utc>,
    pub last_scan_time: DateTime<Utc>,
    pub scan_count: usize,
    pub last_worker: WorkerRef,
    pub is_in_holding: bool,
    pub placement: Placement,
    pub shifts: Vec<ShiftId>,
    pub hours_since_last_scan: f64,
    pub status: Status,
    pub status_label: &'static str,
    #[serde(skip)]
    workers: BTreeSet<UserId>,
}

impl CarRecord {
    /// Aggregate the events of a single car. Returns `None` when there are no events.
    ///
    /// Every event must carry the same identifier; the most recent scan is the maximum by
    /// `(timestamp, scan_id)`.
    pub fn aggregate(events: &[ScanEvent], rules: &YardRules, now: DateTime<Utc>) -> Option<Self> {
        let first = events.iter().min_by_key(|event| event.recency_key())?;
        let last = events.iter().max_by_key(|event| event.recency_key())?;

        let shifts: BTreeSet<ShiftId> = events.iter().map(|event| event.shift).collect();
        let workers: BTreeSet<UserId> = events.iter().map(|event| event.worker.id).collect();
        let hours_since_last_scan = rules.hours_since(last.timestamp, now);
        let status = rules.status_at(last.timestamp, now);

        Some(Self {
            car_identifier: last.car_identifier.clone(),
            first_scan_time: first.timestamp,
            last_scan_time: last.timestamp,
            scan_count: events.len(),
            last_worker: last.worker.clone(),
            is_in_holding: last.placement.is_holding(),
            placement: last.placement.clone(),
            shifts: shifts.into_iter().collect(),
            hours_since_last_scan,
            status,
            status_label: status.label(),
            workers,
        })
    }

    pub fn location(&self) -> Location {
        self.placement.location()
    }

    pub fn scanned_in_shift(&self, shift: ShiftId) -> bool {
        self.shifts.contains(&shift)
    }

    pub fn scanned_by(&self, worker: UserId) -> bool {
        self.workers.contains(&worker)
    }
}

/// Group a window's events by car, newest activity first.
pub fn aggregate_cars(events: &[ScanEvent], rules: &YardRules, now: DateTime<Utc>) -> Vec<CarRecord> {
    let mut grouped: BTreeMap<&CarIdentifier, Vec<ScanEvent>> = BTreeMap::new();
    for event in events {
        grouped
            .entry(&event.car_identifier)
            .or_default()
            .push(event.clone());
    }

    let mut records: Vec<CarRecord> = grouped
        .values()
        .filter_map(|car_events| CarRecord::aggregate(car_events, rules, now))
        .collect();
    records.sort_by(|left, right| {
        right
            .last_scan_time
            .cmp(&left.last_scan_time)
            .then_with(|| left.car_identifier.cmp(&right.car_identifier))
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yard::scans::domain::ScanId;
    use chrono::{Duration, TimeZone};

    fn event(id: u64, car: &str, worker: u64, at: DateTime<Utc>, shift: u8) -> ScanEvent {
        ScanEvent {
            scan_id: ScanId(id),
            car_identifier: CarIdentifier::parse(car).expect("valid id"),
            timestamp: at,
            worker: WorkerRef {
                id: UserId(worker),
                name: format!("Worker {worker}"),
            },
            shift: ShiftId(shift),
            placement: Placement::Parked,
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn aggregate_tracks_first_and_last_scan() {
        let rules = YardRules::standard();
        let mut late = event(2, "abc1", 7, base() + Duration::hours(3), 1);
        late.placement = Placement::Holding {
            vessel_ref: Some("MV Aurora".to_string()),
            holding_area_ref: None,
            stack_number: None,
        };
        let events = vec![late, event(1, "abc1", 3, base(), 1)];

        let record = CarRecord::aggregate(&events, &rules, base() + Duration::hours(8))
            .expect("record built");
        assert_eq!(record.first_scan_time, base());
        assert_eq!(record.last_scan_time, base() + Duration::hours(3));
        assert!(record.first_scan_time <= record.last_scan_time);
        assert_eq!(record.scan_count, 2);
        assert_eq!(record.last_worker.id, UserId(7));
        assert!(record.is_in_holding);
        assert_eq!(record.status, Status::Warning);
        assert!((record.hours_since_last_scan - 5.0).abs() < 1e-9);
        assert!(record.scanned_by(UserId(3)));
    }

    #[test]
    fn equal_timestamps_prefer_later_append() {
        let rules = YardRules::standard();
        let events = vec![event(5, "abc1", 2, base(), 1), event(4, "abc1", 1, base(), 1)];
        let record = CarRecord::aggregate(&events, &rules, base()).expect("record built");
        assert_eq!(record.last_worker.id, UserId(2));
    }

    #[test]
    fn empty_history_has_no_record() {
        assert!(CarRecord::aggregate(&[], &YardRules::standard(), base()).is_none());
    }

    #[test]
    fn aggregate_cars_groups_and_orders_by_recency() {
        let rules = YardRules::standard();
        let events = vec![
            event(1, "AAA", 1, base(), 1),
            event(2, "BBB", 1, base() + Duration::hours(1), 1),
            event(3, "AAA", 2, base() + Duration::hours(5), 2),
        ];
        let cars = aggregate_cars(&events, &rules, base() + Duration::hours(6));
        assert_eq!(cars.len(), 2);
        assert_eq!(cars[0].car_identifier.as_str(), "AAA");
        assert_eq!(cars[0].shifts, vec![ShiftId(1), ShiftId(2)]);
        assert_eq!(cars[1].car_identifier.as_str(), "BBB");
        assert_eq!(cars[1].status, Status::Warning);
    }
}
