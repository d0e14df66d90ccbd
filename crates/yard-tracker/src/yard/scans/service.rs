use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::attributor::{AttributionError, ScanAttributor, ScanOutcome};
use super::domain::{CarIdentifier, Location, Placement, ScanEvent, ScanValidationError};
use super::record::{aggregate_cars, CarRecord};
use super::repository::{ScanLog, ScanLogError};
use crate::yard::clock::Clock;
use crate::yard::report::{render_export, DashboardSummary, ExportError, ExportFile, ExportFormat, ReportKind};
use crate::yard::rules::YardRules;
use crate::yard::shift::{authorize_scan, ShiftConfigError, ShiftId, ShiftViolation, ShiftWindow};
use crate::yard::status::Status;
use crate::yard::users::{Role, Session, User, UserId, UserRepository, UserRepositoryError};

/// Scan submitted by the caller; the worker and timestamp come from the session and clock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanRequest {
    pub car_identifier: String,
    pub location: Location,
    #[serde(default)]
    pub vessel_ref: Option<String>,
    #[serde(default)]
    pub holding_area_ref: Option<String>,
    #[serde(default)]
    pub stack_number: Option<String>,
}

impl ScanRequest {
    pub fn parked(car_identifier: impl Into<String>) -> Self {
        Self {
            car_identifier: car_identifier.into(),
            location: Location::Parked,
            vessel_ref: None,
            holding_area_ref: None,
            stack_number: None,
        }
    }

    pub fn holding(car_identifier: impl Into<String>, vessel_ref: Option<String>) -> Self {
        Self {
            location: Location::Holding,
            vessel_ref,
            ..Self::parked(car_identifier)
        }
    }

    /// Holding attributes sent with a parked scan are ignored.
    pub fn placement(&self) -> Placement {
        match self.location {
            Location::Parked => Placement::Parked,
            Location::Holding => Placement::Holding {
                vessel_ref: self.vessel_ref.clone(),
                holding_area_ref: self.holding_area_ref.clone(),
                stack_number: self.stack_number.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarQuery {
    pub date: Option<NaiveDate>,
    pub shift: Option<ShiftId>,
    pub status: Option<Status>,
    pub holding_only: bool,
    pub worker_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportQuery {
    pub date: Option<NaiveDate>,
    pub shift: Option<ShiftId>,
    pub worker_id: Option<UserId>,
    pub format: ExportFormat,
}

/// Configured windows plus the one in effect at `now`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftOverview {
    pub now: DateTime<Utc>,
    pub current: ShiftWindow,
    pub shifts: Vec<ShiftWindow>,
}

/// Application service behind the scan, car listing, dashboard and export endpoints.
pub struct ScanService<S, U> {
    log: Arc<S>,
    users: Arc<U>,
    rules: Arc<YardRules>,
    clock: Arc<dyn Clock>,
    attributor: ScanAttributor,
}

impl<S, U> ScanService<S, U>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    pub fn new(log: Arc<S>, users: Arc<U>, rules: Arc<YardRules>, clock: Arc<dyn Clock>) -> Self {
        let attributor = ScanAttributor::new(Arc::clone(&rules));
        Self {
            log,
            users,
            rules,
            clock,
            attributor,
        }
    }

    pub fn rules(&self) -> &YardRules {
        &self.rules
    }

    /// Record a scan for the session's user at the current instant.
    ///
    /// Workers may only scan inside their assigned shift; supervisors and admins are exempt.
    pub fn scan(&self, session: &Session, request: ScanRequest) -> Result<ScanOutcome, ScanServiceError> {
        let now = self.clock.now();

        if session.is_worker() {
            let assigned_id = session
                .assigned_shift
                .ok_or(ScanServiceError::MissingAssignedShift)?;
            let assigned = self
                .rules
                .shifts
                .window(assigned_id)
                .ok_or(ScanServiceError::UnknownAssignedShift(assigned_id))?;
            let current = self.rules.shift_at(now)?;
            if let Err(violation) = authorize_scan(assigned, current) {
                warn!(
                    worker = %session.user_id,
                    assigned = %violation.assigned,
                    current = %violation.current,
                    "scan rejected outside assigned shift"
                );
                return Err(violation.into());
            }
        }

        let outcome = self.attributor.record_scan(
            &request.car_identifier,
            session.worker_ref(),
            request.placement(),
            now,
            self.log.as_ref(),
        )?;

        info!(
            car = %outcome.car.car_identifier,
            worker = %session.user_id,
            shift = %outcome.event.shift,
            location = outcome.event.placement.location().label(),
            is_new = outcome.is_new,
            "scan recorded"
        );
        Ok(outcome)
    }

    /// Cars seen in the reporting window, newest activity first.
    ///
    /// Workers only see cars scanned in their assigned shift and cannot widen that scope.
    pub fn cars(&self, session: &Session, query: CarQuery) -> Result<Vec<CarRecord>, ScanServiceError> {
        let now = self.clock.now();
        let date = query.date.unwrap_or_else(|| self.rules.business_date(now));
        let shift = if session.is_worker() {
            Some(
                session
                    .assigned_shift
                    .ok_or(ScanServiceError::MissingAssignedShift)?,
            )
        } else {
            query.shift
        };

        let events = self.window_events(date)?;
        let cars = aggregate_cars(&events, &self.rules, now)
            .into_iter()
            .filter(|car| shift.map_or(true, |shift| car.scanned_in_shift(shift)))
            .filter(|car| query.status.map_or(true, |status| car.status == status))
            .filter(|car| !query.holding_only || car.is_in_holding)
            .filter(|car| query.worker_id.map_or(true, |worker| car.scanned_by(worker)))
            .collect();
        Ok(cars)
    }

    /// Every scan of one car in the reporting window, oldest first.
    pub fn car_history(
        &self,
        session: &Session,
        car_identifier: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<ScanEvent>, ScanServiceError> {
        let car = CarIdentifier::parse(car_identifier)?;
        let date = date.unwrap_or_else(|| self.rules.business_date(self.clock.now()));
        let (from, until) = self.rules.window_bounds(date);
        let mut history = self.log.history(&car, from, until)?;
        if session.is_worker() {
            let shift = session
                .assigned_shift
                .ok_or(ScanServiceError::MissingAssignedShift)?;
            if !history.iter().any(|event| event.shift == shift) {
                history.clear();
            }
        }
        history.sort_by_key(ScanEvent::recency_key);
        Ok(history)
    }

    /// Per-status counts scoped to the caller: workers see their own scans in their shift,
    /// supervisors the scans of their workers, admins everything.
    pub fn dashboard(
        &self,
        session: &Session,
        date: Option<NaiveDate>,
    ) -> Result<DashboardSummary, ScanServiceError> {
        let now = self.clock.now();
        let date = date.unwrap_or_else(|| self.rules.business_date(now));
        let events = self.window_events(date)?;

        let (scoped, active_workers): (Vec<&ScanEvent>, Option<usize>) = match session.role {
            Role::Worker => {
                let shift = session
                    .assigned_shift
                    .ok_or(ScanServiceError::MissingAssignedShift)?;
                let scoped = events
                    .iter()
                    .filter(|event| event.worker.id == session.user_id && event.shift == shift)
                    .collect();
                (scoped, None)
            }
            Role::Supervisor => {
                let team = self.supervised_workers(session.user_id)?;
                let ids: BTreeSet<UserId> = team.iter().map(|user| user.id).collect();
                let scoped = events
                    .iter()
                    .filter(|event| ids.contains(&event.worker.id))
                    .collect();
                let active = team.iter().filter(|user| user.is_active).count();
                (scoped, Some(active))
            }
            Role::Admin => {
                let active = self
                    .users
                    .list()?
                    .iter()
                    .filter(|user| user.role == Role::Worker && user.is_active)
                    .count();
                (events.iter().collect(), Some(active))
            }
        };

        let touched: BTreeSet<&CarIdentifier> =
            scoped.iter().map(|event| &event.car_identifier).collect();
        let cars = aggregate_cars(&events, &self.rules, now);
        let summary = DashboardSummary::from_records(
            date,
            cars.iter()
                .filter(|car| touched.contains(&car.car_identifier)),
            scoped.len(),
            active_workers,
        );
        Ok(summary)
    }

    /// Render the general or holding report. Workers may not export.
    pub fn export(
        &self,
        session: &Session,
        kind: ReportKind,
        query: ExportQuery,
    ) -> Result<ExportFile, ScanServiceError> {
        if session.is_worker() {
            return Err(ScanServiceError::Forbidden {
                role: session.role,
                action: "export reports",
            });
        }

        let now = self.clock.now();
        let date = query.date.unwrap_or_else(|| self.rules.business_date(now));
        let records = self.cars(
            session,
            CarQuery {
                date: Some(date),
                shift: query.shift,
                status: None,
                holding_only: kind == ReportKind::Holding,
                worker_id: query.worker_id,
            },
        )?;

        let file = render_export(
            kind,
            query.format,
            &records,
            &self.rules,
            date,
            query.shift,
            query.worker_id,
        )?;
        info!(
            actor = %session.user_id,
            filename = %file.filename,
            rows = records.len(),
            "report exported"
        );
        Ok(file)
    }

    pub fn shift_overview(&self) -> Result<ShiftOverview, ScanServiceError> {
        let now = self.clock.now();
        let current = self.rules.shift_at(now)?.clone();
        Ok(ShiftOverview {
            now,
            current,
            shifts: self.rules.shifts.windows().to_vec(),
        })
    }

    fn window_events(&self, date: NaiveDate) -> Result<Vec<ScanEvent>, ScanServiceError> {
        let (from, until) = self.rules.window_bounds(date);
        Ok(self.log.between(from, until)?)
    }

    fn supervised_workers(&self, supervisor: UserId) -> Result<Vec<User>, ScanServiceError> {
        Ok(self
            .users
            .list()?
            .into_iter()
            .filter(|user| user.role == Role::Worker && user.supervisor_ref == Some(supervisor))
            .collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanServiceError {
    #[error(transparent)]
    Validation(#[from] ScanValidationError),
    #[error("workers must have an assigned shift before scanning")]
    MissingAssignedShift,
    #[error("assigned shift {0} is not part of the configured shift scheme")]
    UnknownAssignedShift(ShiftId),
    #[error(transparent)]
    ShiftViolation(#[from] ShiftViolation),
    #[error(transparent)]
    Configuration(#[from] ShiftConfigError),
    #[error("{} role may not {action}", .role.label())]
    Forbidden { role: Role, action: &'static str },
    #[error(transparent)]
    Log(#[from] ScanLogError),
    #[error(transparent)]
    Users(#[from] UserRepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl From<AttributionError> for ScanServiceError {
    fn from(error: AttributionError) -> Self {
        match error {
            AttributionError::Validation(inner) => Self::Validation(inner),
            AttributionError::Configuration(inner) => Self::Configuration(inner),
            AttributionError::Log(inner) => Self::Log(inner),
            other @ AttributionError::EmptyHistory => {
                Self::Log(ScanLogError::Unavailable(other.to_string()))
            }
        }
    }
}
