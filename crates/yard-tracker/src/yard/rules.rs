use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use super::shift::{resolve_shift, ShiftConfigError, ShiftScheme, ShiftWindow};
use super::status::{hours_elapsed, Status, StatusThresholds};
use super::window::ReportingWindow;

/// Version of the canonical rule set (status bands measured from the last scan).
pub const RULES_VERSION: u32 = 1;

/// The single rule set every yard component evaluates against.
#[derive(Debug, Clone, PartialEq)]
pub struct YardRules {
    pub version: u32,
    pub thresholds: StatusThresholds,
    pub shifts: ShiftScheme,
    pub window: ReportingWindow,
}

impl Default for YardRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl YardRules {
    pub fn standard() -> Self {
        Self::new(
            StatusThresholds::default(),
            ShiftScheme::four_hour_blocks(),
            ReportingWindow::default(),
        )
    }

    pub fn new(thresholds: StatusThresholds, shifts: ShiftScheme, window: ReportingWindow) -> Self {
        Self {
            version: RULES_VERSION,
            thresholds,
            shifts,
            window,
        }
    }

    pub fn local_time(&self, timestamp: DateTime<Utc>) -> DateTime<FixedOffset> {
        self.window.local_time(timestamp)
    }

    pub fn shift_at(&self, timestamp: DateTime<Utc>) -> Result<&ShiftWindow, ShiftConfigError> {
        resolve_shift(&self.local_time(timestamp), &self.shifts)
    }

    pub fn business_date(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        self.window.business_date(timestamp)
    }

    pub fn window_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        self.window.bounds(date)
    }

    pub fn hours_since(&self, last_scan: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        hours_elapsed(last_scan, now)
    }

    pub fn status_at(&self, last_scan: DateTime<Utc>, now: DateTime<Utc>) -> Status {
        self.thresholds.status_since(last_scan, now)
    }
}
