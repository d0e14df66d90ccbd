use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{CarIdentifier, NewScan, Placement, ScanEvent, ScanValidationError};
use super::record::CarRecord;
use super::repository::{ScanLog, ScanLogError};
use crate::yard::rules::YardRules;
use crate::yard::shift::{ShiftConfigError, ShiftId};
use crate::yard::users::{UserId, WorkerRef};

/// Summary of an earlier scan of the same car in the current reporting window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviousScan {
    pub worker_id: UserId,
    pub worker: String,
    pub shift: ShiftId,
    pub scanned_at: DateTime<Utc>,
    pub time_ago: String,
}

impl PreviousScan {
    fn from_event(event: &ScanEvent, now: DateTime<Utc>) -> Self {
        Self {
            worker_id: event.worker.id,
            worker: event.worker.name.clone(),
            shift: event.shift,
            scanned_at: event.timestamp,
            time_ago: format_time_ago(event.timestamp, now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub car: CarRecord,
    pub is_new: bool,
    pub previous_scans: Vec<PreviousScan>,
    pub event: ScanEvent,
}

/// Decides whether a scan is the first of the window, summarizes earlier scans and appends
/// the new event.
#[derive(Debug, Clone)]
pub struct ScanAttributor {
    rules: Arc<YardRules>,
}

impl ScanAttributor {
    pub fn new(rules: Arc<YardRules>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &YardRules {
        &self.rules
    }

    /// Record one scan at `timestamp`, which is also the evaluation instant for the
    /// returned car status and `time_ago` strings.
    pub fn record_scan<L>(
        &self,
        car_identifier: &str,
        worker: WorkerRef,
        placement: Placement,
        timestamp: DateTime<Utc>,
        log: &L,
    ) -> Result<ScanOutcome, AttributionError>
    where
        L: ScanLog + ?Sized,
    {
        let car_identifier = CarIdentifier::parse(car_identifier)?;
        let shift = self.rules.shift_at(timestamp)?.id;
        let (from, until) = self.rules.window.bounds_containing(timestamp);

        let (recorded, event) = log.append_in_window(
            NewScan {
                car_identifier,
                timestamp,
                worker,
                shift,
                placement: placement.normalized(),
            },
            from,
            until,
        )?;

        // Backfilled scans may already hold later timestamps; only earlier ones count here.
        let mut prior: Vec<ScanEvent> = recorded
            .into_iter()
            .filter(|earlier| earlier.timestamp <= timestamp)
            .collect();
        prior.sort_by_key(|earlier| std::cmp::Reverse(earlier.recency_key()));
        let previous_scans: Vec<PreviousScan> = prior
            .iter()
            .map(|earlier| PreviousScan::from_event(earlier, timestamp))
            .collect();

        let mut history = prior;
        history.push(event.clone());
        let car = CarRecord::aggregate(&history, &self.rules, timestamp)
            .ok_or(AttributionError::EmptyHistory)?;

        Ok(ScanOutcome {
            car,
            is_new: previous_scans.is_empty(),
            previous_scans,
            event,
        })
    }
}

/// Human readable age of a scan: minutes under an hour, whole hours afterwards.
pub fn format_time_ago(scanned_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - scanned_at).num_minutes().max(0);
    if minutes < 60 {
        format!("{minutes} min ago")
    } else {
        format!("{}h ago", minutes / 60)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    #[error(transparent)]
    Validation(#[from] ScanValidationError),
    #[error(transparent)]
    Configuration(#[from] ShiftConfigError),
    #[error(transparent)]
    Log(#[from] ScanLogError),
    #[error("scan log returned no history for an appended scan")]
    EmptyHistory,
}
