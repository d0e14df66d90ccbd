//! Scan attribution over an append-only log and the per-car view derived from it.

pub mod attributor;
pub mod domain;
pub mod record;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use attributor::{format_time_ago, AttributionError, PreviousScan, ScanAttributor, ScanOutcome};
pub use domain::{
    CarIdentifier, Location, NewScan, Placement, ScanEvent, ScanId, ScanValidationError,
    MAX_IDENTIFIER_LEN,
};
pub use record::{aggregate_cars, CarRecord};
pub use repository::{ScanLog, ScanLogError};
pub use router::scan_router;
pub use service::{CarQuery, ExportQuery, ScanRequest, ScanService, ScanServiceError, ShiftOverview};
