use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::repository::ScanLog;
use super::service::{CarQuery, ExportQuery, ScanRequest, ScanService};
use crate::yard::http::{parse_date, resolve_session, ApiError};
use crate::yard::report::{ExportFormat, ReportKind};
use crate::yard::shift::ShiftId;
use crate::yard::status::Status;
use crate::yard::users::{UserId, UserRepository, UserService};

/// Shared state for the scan endpoints; sessions are resolved through the user service.
pub struct ScanRouterState<S, U> {
    pub scans: Arc<ScanService<S, U>>,
    pub users: Arc<UserService<U>>,
}

impl<S, U> Clone for ScanRouterState<S, U> {
    fn clone(&self) -> Self {
        Self {
            scans: Arc::clone(&self.scans),
            users: Arc::clone(&self.users),
        }
    }
}

/// Router builder exposing the scan, listing, dashboard, export and shift endpoints.
pub fn scan_router<S, U>(scans: Arc<ScanService<S, U>>, users: Arc<UserService<U>>) -> Router
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    Router::new()
        .route("/api/v1/yard/scan", post(scan_handler::<S, U>))
        .route("/api/v1/yard/cars", get(cars_handler::<S, U>))
        .route(
            "/api/v1/yard/cars/:car_identifier/history",
            get(history_handler::<S, U>),
        )
        .route("/api/v1/yard/dashboard", get(dashboard_handler::<S, U>))
        .route("/api/v1/yard/export", get(export_handler::<S, U>))
        .route(
            "/api/v1/yard/export/holding",
            get(holding_export_handler::<S, U>),
        )
        .route("/api/v1/yard/shifts", get(shifts_handler::<S, U>))
        .with_state(ScanRouterState { scans, users })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CarsParams {
    date: Option<String>,
    shift: Option<u8>,
    status: Option<String>,
    #[serde(default)]
    holding_only: bool,
    worker_id: Option<u64>,
}

impl CarsParams {
    fn into_query(self) -> Result<CarQuery, ApiError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()
            .map_err(|unknown| ApiError::validation(format!("unknown status {:?}", unknown.0)))?;
        Ok(CarQuery {
            date: parse_date(self.date.as_deref())?,
            shift: self.shift.map(ShiftId),
            status,
            holding_only: self.holding_only,
            worker_id: self.worker_id.map(UserId),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DateParams {
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportParams {
    date: Option<String>,
    shift: Option<u8>,
    worker_id: Option<u64>,
    format: Option<String>,
}

impl ExportParams {
    fn into_query(self) -> Result<ExportQuery, ApiError> {
        let format = self
            .format
            .as_deref()
            .map(str::parse::<ExportFormat>)
            .transpose()
            .map_err(|unknown| {
                ApiError::validation(format!("unknown export format {unknown:?}, use xlsx or csv"))
            })?
            .unwrap_or_default();
        Ok(ExportQuery {
            date: parse_date(self.date.as_deref())?,
            shift: self.shift.map(ShiftId),
            worker_id: self.worker_id.map(UserId),
            format,
        })
    }
}

pub(crate) async fn scan_handler<S, U>(
    State(state): State<ScanRouterState<S, U>>,
    headers: HeaderMap,
    Json(request): Json<ScanRequest>,
) -> Result<Response, ApiError>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &state.users)?;
    let outcome = state.scans.scan(&session, request)?;

    let message = if outcome.is_new {
        format!("Car {} recorded", outcome.car.car_identifier)
    } else {
        format!(
            "Car {} already scanned {} time(s) today",
            outcome.car.car_identifier,
            outcome.previous_scans.len()
        )
    };
    let status = if outcome.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let payload = json!({
        "message": message,
        "car": outcome.car,
        "is_new": outcome.is_new,
        "previous_scans": outcome.previous_scans,
    });
    Ok((status, Json(payload)).into_response())
}

pub(crate) async fn cars_handler<S, U>(
    State(state): State<ScanRouterState<S, U>>,
    headers: HeaderMap,
    Query(params): Query<CarsParams>,
) -> Result<Response, ApiError>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &state.users)?;
    let cars = state.scans.cars(&session, params.into_query()?)?;
    Ok((StatusCode::OK, Json(cars)).into_response())
}

pub(crate) async fn history_handler<S, U>(
    State(state): State<ScanRouterState<S, U>>,
    headers: HeaderMap,
    Path(car_identifier): Path<String>,
    Query(params): Query<DateParams>,
) -> Result<Response, ApiError>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &state.users)?;
    let date = parse_date(params.date.as_deref())?;
    let history = state.scans.car_history(&session, &car_identifier, date)?;
    Ok((StatusCode::OK, Json(history)).into_response())
}

pub(crate) async fn dashboard_handler<S, U>(
    State(state): State<ScanRouterState<S, U>>,
    headers: HeaderMap,
    Query(params): Query<DateParams>,
) -> Result<Response, ApiError>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    let session = resolve_session(&headers, &state.users)?;
    let summary = state
        .scans
        .dashboard(&session, parse_date(params.date.as_deref())?)?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

pub(crate) async fn export_handler<S, U>(
    State(state): State<ScanRouterState<S, U>>,
    headers: HeaderMap,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    export_response(&state, &headers, ReportKind::General, params)
}

pub(crate) async fn holding_export_handler<S, U>(
    State(state): State<ScanRouterState<S, U>>,
    headers: HeaderMap,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    export_response(&state, &headers, ReportKind::Holding, params)
}

fn export_response<S, U>(
    state: &ScanRouterState<S, U>,
    headers: &HeaderMap,
    kind: ReportKind,
    params: ExportParams,
) -> Result<Response, ApiError>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    let session = resolve_session(headers, &state.users)?;
    let file = state.scans.export(&session, kind, params.into_query()?)?;
    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

pub(crate) async fn shifts_handler<S, U>(
    State(state): State<ScanRouterState<S, U>>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: ScanLog + 'static,
    U: UserRepository + 'static,
{
    resolve_session(&headers, &state.users)?;
    let overview = state.scans.shift_overview()?;
    Ok((StatusCode::OK, Json(overview)).into_response())
}
