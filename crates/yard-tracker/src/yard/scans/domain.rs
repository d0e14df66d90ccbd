use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::yard::shift::ShiftId;
use crate::yard::users::WorkerRef;

pub const MAX_IDENTIFIER_LEN: usize = 100;

/// Normalized (trimmed, uppercase) car identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CarIdentifier(String);

impl CarIdentifier {
    pub fn parse(raw: &str) -> Result<Self, ScanValidationError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(ScanValidationError::EmptyIdentifier);
        }
        let length = normalized.chars().count();
        if length > MAX_IDENTIFIER_LEN {
            return Err(ScanValidationError::IdentifierTooLong { length });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CarIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanValidationError {
    #[error("car identifier is required")]
    EmptyIdentifier,
    #[error("car identifier is {length} characters long, the limit is {max}", max = MAX_IDENTIFIER_LEN)]
    IdentifierTooLong { length: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Parked,
    Holding,
}

impl Location {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Parked => "Parked",
            Self::Holding => "Holding",
        }
    }
}

/// Where a scan placed the car. Holding attributes only exist for holding scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum Placement {
    Parked,
    Holding {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vessel_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        holding_area_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack_number: Option<String>,
    },
}

impl Placement {
    pub fn location(&self) -> Location {
        match self {
            Self::Parked => Location::Parked,
            Self::Holding { .. } => Location::Holding,
        }
    }

    pub fn is_holding(&self) -> bool {
        matches!(self, Self::Holding { .. })
    }

    /// Blank holding attributes are dropped rather than stored as empty strings.
    pub fn normalized(self) -> Self {
        match self {
            Self::Parked => Self::Parked,
            Self::Holding {
                vessel_ref,
                holding_area_ref,
                stack_number,
            } => Self::Holding {
                vessel_ref: non_blank(vessel_ref),
                holding_area_ref: non_blank(holding_area_ref),
                stack_number: non_blank(stack_number),
            },
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Sequence number assigned by the scan log in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScanId(pub u64);

/// Scan waiting to be appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    pub car_identifier: CarIdentifier,
    pub timestamp: DateTime<Utc>,
    pub worker: WorkerRef,
    pub shift: ShiftId,
    pub placement: Placement,
}

/// Recorded observation of a car. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub scan_id: ScanId,
    pub car_identifier: CarIdentifier,
    pub timestamp: DateTime<Utc>,
    pub worker: WorkerRef,
    pub shift: ShiftId,
    #[serde(flatten)]
    pub placement: Placement,
}

impl ScanEvent {
    pub fn from_new(scan_id: ScanId, scan: NewScan) -> Self {
        Self {
            scan_id,
            car_identifier: scan.car_identifier,
            timestamp: scan.timestamp,
            worker: scan.worker,
            shift: scan.shift,
            placement: scan.placement,
        }
    }

    /// Ordering key deciding which scan is the most recent.
    pub fn recency_key(&self) -> (DateTime<Utc>, ScanId) {
        (self.timestamp, self.scan_id)
    }
}
