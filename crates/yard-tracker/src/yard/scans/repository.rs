use chrono::{DateTime, Utc};

use super::domain::{CarIdentifier, NewScan, ScanEvent};

/// Append-only scan history.
///
/// Implementations assign increasing [`ScanId`](super::domain::ScanId)s in append order and
/// serialize appends per car. There is deliberately no way to modify or remove an event.
pub trait ScanLog: Send + Sync {
    fn append(&self, scan: NewScan) -> Result<ScanEvent, ScanLogError>;

    /// Read the car's events with `from <= timestamp < until` and append `scan` as one step.
    ///
    /// No other append may land between the read and the write, so two scans of the same car
    /// cannot both see an empty window.
    fn append_in_window(
        &self,
        scan: NewScan,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<(Vec<ScanEvent>, ScanEvent), ScanLogError>;

    /// Events for one car with `from <= timestamp < until`, in append order.
    fn history(
        &self,
        car: &CarIdentifier,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ScanEvent>, ScanLogError>;

    /// Every event with `from <= timestamp < until`, in append order.
    fn between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ScanEvent>, ScanLogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ScanLogError {
    #[error("scan log unavailable: {0}")]
    Unavailable(String),
}
