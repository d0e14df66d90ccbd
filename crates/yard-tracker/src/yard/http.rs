use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;

use super::scans::ScanServiceError;
use super::users::{Session, UserRepository, UserRepositoryError, UserService, UserServiceError};

/// Error payload shared by every yard endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorBody {
    pub kind: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_start_hour: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                kind,
                error: error.into(),
                shift_start_hour: None,
            },
        }
    }

    pub fn validation(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", error)
    }

    pub fn unauthenticated(error: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ScanServiceError> for ApiError {
    fn from(error: ScanServiceError) -> Self {
        match &error {
            ScanServiceError::Validation(_)
            | ScanServiceError::MissingAssignedShift
            | ScanServiceError::UnknownAssignedShift(_) => Self::validation(error.to_string()),
            ScanServiceError::ShiftViolation(violation) => {
                let mut api = Self::new(StatusCode::FORBIDDEN, "shift_violation", error.to_string());
                api.body.shift_start_hour = Some(violation.start_hour);
                api
            }
            ScanServiceError::Forbidden { .. } => {
                Self::new(StatusCode::FORBIDDEN, "forbidden", error.to_string())
            }
            ScanServiceError::Configuration(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "configuration", error.to_string())
            }
            ScanServiceError::Log(_) | ScanServiceError::Users(_) | ScanServiceError::Export(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "unavailable", error.to_string())
            }
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(error: UserServiceError) -> Self {
        match &error {
            UserServiceError::Validation(_) => Self::validation(error.to_string()),
            UserServiceError::Forbidden { .. } => {
                Self::new(StatusCode::FORBIDDEN, "forbidden", error.to_string())
            }
            UserServiceError::NotFound(_) | UserServiceError::Repository(UserRepositoryError::NotFound) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", error.to_string())
            }
            UserServiceError::Inactive(_)
            | UserServiceError::InvalidCredentials
            | UserServiceError::InvalidToken => Self::unauthenticated(error.to_string()),
            UserServiceError::Auth(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "auth", error.to_string())
            }
            UserServiceError::Repository(UserRepositoryError::Conflict) => {
                Self::new(StatusCode::CONFLICT, "conflict", error.to_string())
            }
            UserServiceError::Repository(UserRepositoryError::Unavailable(_)) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "unavailable", error.to_string())
            }
        }
    }
}

/// Resolve the caller from an `Authorization: Bearer <token>` header.
pub fn resolve_session<U>(headers: &HeaderMap, users: &UserService<U>) -> Result<Session, ApiError>
where
    U: UserRepository + 'static,
{
    let token = bearer_token(headers)?;
    users.authenticate(token).map_err(|error| match error {
        UserServiceError::NotFound(_) => ApiError::unauthenticated(error.to_string()),
        other => ApiError::from(other),
    })
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let raw = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;
    raw.to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthenticated("authorization header must be `Bearer <token>`"))
}

/// Parse an optional `YYYY-MM-DD` query parameter.
pub fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::validation(format!("invalid date {value:?}, expected YYYY-MM-DD"))),
    }
}
