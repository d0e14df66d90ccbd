use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Identifier of a configured shift window (1-based in the built-in schemes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShiftId(pub u8);

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time-of-day window a worker can be assigned to.
///
/// `end_hour < start_hour` wraps past midnight; `start_hour == end_hour` spans the whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub id: ShiftId,
    pub label: String,
    pub start_hour: u8,
    pub end_hour: u8,
}

impl ShiftWindow {
    pub fn new(id: u8, label: impl Into<String>, start_hour: u8, end_hour: u8) -> Self {
        Self {
            id: ShiftId(id),
            label: label.into(),
            start_hour,
            end_hour,
        }
    }

    pub fn contains_hour(&self, hour: u8) -> bool {
        match self.start_hour.cmp(&self.end_hour) {
            std::cmp::Ordering::Less => self.start_hour <= hour && hour < self.end_hour,
            std::cmp::Ordering::Greater => hour >= self.start_hour || hour < self.end_hour,
            std::cmp::Ordering::Equal => true,
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end_hour < self.start_hour
    }

    pub fn duration_hours(&self) -> u8 {
        if self.start_hour == self.end_hour {
            24
        } else {
            (self.end_hour + 24 - self.start_hour) % 24
        }
    }
}

/// Built-in shift layouts selectable through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSchemeKind {
    TwoShift,
    FourHourBlocks,
}

impl ShiftSchemeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TwoShift => "two_shift",
            Self::FourHourBlocks => "four_hour_blocks",
        }
    }

    pub fn scheme(self) -> ShiftScheme {
        match self {
            Self::TwoShift => ShiftScheme::two_shift(),
            Self::FourHourBlocks => ShiftScheme::four_hour_blocks(),
        }
    }
}

impl FromStr for ShiftSchemeKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "two_shift" | "day_night" => Ok(Self::TwoShift),
            "four_hour_blocks" | "five_shift" => Ok(Self::FourHourBlocks),
            other => Err(other.to_string()),
        }
    }
}

/// Misconfigured shift layouts. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShiftConfigError {
    #[error("shift scheme has no windows")]
    Empty,
    #[error("shift {id} uses hour {hour}, hours must be within 0..24")]
    HourOutOfRange { id: ShiftId, hour: u8 },
    #[error("shift id {0} is defined more than once")]
    DuplicateId(ShiftId),
    #[error("no shift covers {hour:02}:00")]
    Gap { hour: u8 },
    #[error("shifts {first} and {second} both cover {hour:02}:00")]
    Overlap {
        hour: u8,
        first: ShiftId,
        second: ShiftId,
    },
}

/// Validated set of contiguous, non-overlapping windows covering the whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftScheme {
    windows: Vec<ShiftWindow>,
}

impl ShiftScheme {
    pub fn new(windows: Vec<ShiftWindow>) -> Result<Self, ShiftConfigError> {
        validate_windows(&windows)?;
        Ok(Self { windows })
    }

    /// Day 06:00-18:00, night 18:00-06:00.
    pub fn two_shift() -> Self {
        Self {
            windows: vec![
                ShiftWindow::new(1, "Day (06:00-18:00)", 6, 18),
                ShiftWindow::new(2, "Night (18:00-06:00)", 18, 6),
            ],
        }
    }

    /// Four-hour blocks from 06:00 with an extended overnight block 22:00-06:00.
    pub fn four_hour_blocks() -> Self {
        Self {
            windows: vec![
                ShiftWindow::new(1, "6AM-10AM", 6, 10),
                ShiftWindow::new(2, "10AM-2PM", 10, 14),
                ShiftWindow::new(3, "2PM-6PM", 14, 18),
                ShiftWindow::new(4, "6PM-10PM", 18, 22),
                ShiftWindow::new(5, "10PM-6AM", 22, 6),
            ],
        }
    }

    pub fn windows(&self) -> &[ShiftWindow] {
        &self.windows
    }

    pub fn window(&self, id: ShiftId) -> Option<&ShiftWindow> {
        self.windows.iter().find(|window| window.id == id)
    }

    pub fn resolve_hour(&self, hour: u8) -> Result<&ShiftWindow, ShiftConfigError> {
        let mut matching = self.windows.iter().filter(|window| window.contains_hour(hour));
        let first = matching.next().ok_or(ShiftConfigError::Gap { hour })?;
        if let Some(second) = matching.next() {
            return Err(ShiftConfigError::Overlap {
                hour,
                first: first.id,
                second: second.id,
            });
        }
        Ok(first)
    }
}

/// Resolve the window covering the wall-clock hour of `timestamp` in its own time zone.
pub fn resolve_shift<'a, Tz: TimeZone>(
    timestamp: &DateTime<Tz>,
    scheme: &'a ShiftScheme,
) -> Result<&'a ShiftWindow, ShiftConfigError> {
    // hour() is always < 24
    scheme.resolve_hour(timestamp.hour() as u8)
}

fn validate_windows(windows: &[ShiftWindow]) -> Result<(), ShiftConfigError> {
    if windows.is_empty() {
        return Err(ShiftConfigError::Empty);
    }

    let mut ids = BTreeSet::new();
    for window in windows {
        for hour in [window.start_hour, window.end_hour] {
            if hour >= 24 {
                return Err(ShiftConfigError::HourOutOfRange {
                    id: window.id,
                    hour,
                });
            }
        }
        if !ids.insert(window.id) {
            return Err(ShiftConfigError::DuplicateId(window.id));
        }
    }

    for hour in 0..24u8 {
        let mut covering = windows.iter().filter(|window| window.contains_hour(hour));
        let first = covering.next().ok_or(ShiftConfigError::Gap { hour })?;
        if let Some(second) = covering.next() {
            return Err(ShiftConfigError::Overlap {
                hour,
                first: first.id,
                second: second.id,
            });
        }
    }

    Ok(())
}

/// A worker attempted to scan outside their assigned window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "scanning is limited to your assigned shift {assigned_label}; your shift starts at {start_hour:02}:00"
)]
pub struct ShiftViolation {
    pub assigned: ShiftId,
    pub assigned_label: String,
    pub start_hour: u8,
    pub current: ShiftId,
}

pub fn authorize_scan(
    worker_assigned_shift: &ShiftWindow,
    current_shift: &ShiftWindow,
) -> Result<(), ShiftViolation> {
    if worker_assigned_shift.id == current_shift.id {
        return Ok(());
    }

    Err(ShiftViolation {
        assigned: worker_assigned_shift.id,
        assigned_label: worker_assigned_shift.label.clone(),
        start_hour: worker_assigned_shift.start_hour,
        current: current_shift.id,
    })
}
