use chrono::NaiveDate;
use serde::Serialize;

use crate::yard::scans::CarRecord;
use crate::yard::status::Status;

/// Per-status counts for one reporting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub total_cars: usize,
    pub normal_cars: usize,
    pub warning_cars: usize,
    pub overdue_cars: usize,
    pub holding_cars: usize,
    pub total_scans: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_workers: Option<usize>,
}

impl DashboardSummary {
    pub fn from_records<'a, I>(
        date: NaiveDate,
        cars: I,
        total_scans: usize,
        active_workers: Option<usize>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a CarRecord>,
    {
        let mut summary = Self {
            date,
            total_cars: 0,
            normal_cars: 0,
            warning_cars: 0,
            overdue_cars: 0,
            holding_cars: 0,
            total_scans,
            active_workers,
        };

        for car in cars {
            summary.total_cars += 1;
            match car.status {
                Status::Normal => summary.normal_cars += 1,
                Status::Warning => summary.warning_cars += 1,
                Status::Overdue => summary.overdue_cars += 1,
            }
            if car.is_in_holding {
                summary.holding_cars += 1;
            }
        }

        summary
    }

    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Normal => self.normal_cars,
            Status::Warning => self.warning_cars,
            Status::Overdue => self.overdue_cars,
        }
    }
}
