use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a car's dwell time, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Normal,
    Warning,
    Overdue,
}

impl Status {
    pub const fn ordered() -> [Self; 3] {
        [Self::Normal, Self::Warning, Self::Overdue]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Overdue => "overdue",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
            Self::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}' (expected normal, warning or overdue)")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "warning" => Ok(Self::Warning),
            "overdue" => Ok(Self::Overdue),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

pub const DEFAULT_WARNING_HOURS: f64 = 4.0;
pub const DEFAULT_OVERDUE_HOURS: f64 = 12.0;

/// Lower bounds (inclusive) of the warning and overdue bands, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusThresholds {
    warning_hours: f64,
    overdue_hours: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            warning_hours: DEFAULT_WARNING_HOURS,
            overdue_hours: DEFAULT_OVERDUE_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatusConfigError {
    #[error("status thresholds must be finite and non-negative (warning {warning}, overdue {overdue})")]
    OutOfRange { warning: f64, overdue: f64 },
    #[error("warning threshold ({warning}h) must be below the overdue threshold ({overdue}h)")]
    Inverted { warning: f64, overdue: f64 },
}

impl StatusThresholds {
    pub fn new(warning_hours: f64, overdue_hours: f64) -> Result<Self, StatusConfigError> {
        let finite = warning_hours.is_finite() && overdue_hours.is_finite();
        if !finite || warning_hours < 0.0 || overdue_hours < 0.0 {
            return Err(StatusConfigError::OutOfRange {
                warning: warning_hours,
                overdue: overdue_hours,
            });
        }
        if warning_hours >= overdue_hours {
            return Err(StatusConfigError::Inverted {
                warning: warning_hours,
                overdue: overdue_hours,
            });
        }

        Ok(Self {
            warning_hours,
            overdue_hours,
        })
    }

    pub fn warning_hours(&self) -> f64 {
        self.warning_hours
    }

    pub fn overdue_hours(&self) -> f64 {
        self.overdue_hours
    }

    /// Negative or NaN input (clock skew) counts as zero elapsed time.
    pub fn classify(&self, hours_elapsed: f64) -> Status {
        let hours = if hours_elapsed.is_nan() || hours_elapsed < 0.0 {
            0.0
        } else {
            hours_elapsed
        };

        if hours >= self.overdue_hours {
            Status::Overdue
        } else if hours >= self.warning_hours {
            Status::Warning
        } else {
            Status::Normal
        }
    }

    /// Status of a car whose most recent scan happened at `last_scan`, evaluated at `now`.
    pub fn status_since(&self, last_scan: DateTime<Utc>, now: DateTime<Utc>) -> Status {
        self.classify(hours_elapsed(last_scan, now))
    }
}

/// Classify with the default 4h / 12h bands.
pub fn classify(hours_elapsed: f64) -> Status {
    StatusThresholds::default().classify(hours_elapsed)
}

/// Fractional hours from `from` to `to`, clamped at zero.
pub fn hours_elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = (to - from).num_milliseconds();
    (millis as f64 / 3_600_000.0).max(0.0)
}
