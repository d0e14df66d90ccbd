use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// Business day used to decide whether a scan is new and to scope reports.
///
/// A day starts at `boundary_hour` local time (UTC offset `offset`) and lasts 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    boundary_hour: u8,
    offset: FixedOffset,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reporting window boundary hour {0} must be within 0..24")]
pub struct WindowConfigError(pub u8);

impl Default for ReportingWindow {
    fn default() -> Self {
        Self {
            boundary_hour: 0,
            offset: utc_offset(),
        }
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

impl ReportingWindow {
    pub fn new(boundary_hour: u8, offset: FixedOffset) -> Result<Self, WindowConfigError> {
        if boundary_hour >= 24 {
            return Err(WindowConfigError(boundary_hour));
        }
        Ok(Self {
            boundary_hour,
            offset,
        })
    }

    pub fn boundary_hour(&self) -> u8 {
        self.boundary_hour
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_time(&self, timestamp: DateTime<Utc>) -> DateTime<FixedOffset> {
        timestamp.with_timezone(&self.offset)
    }

    /// Calendar date naming the window that contains `timestamp`.
    pub fn business_date(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        let shifted = self.local_time(timestamp).naive_local()
            - Duration::hours(i64::from(self.boundary_hour));
        shifted.date()
    }

    /// Half-open `[start, end)` bounds of the window named by `date`.
    pub fn bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_start =
            date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(self.boundary_hour));
        let utc_start =
            local_start - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        let start = Utc.from_utc_datetime(&utc_start);
        (start, start + Duration::hours(24))
    }

    pub fn bounds_containing(&self, timestamp: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        self.bounds(self.business_date(timestamp))
    }
}
