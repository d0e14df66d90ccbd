use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::yard::http::ApiError;
use crate::yard::scans::ScanServiceError;
use crate::yard::users::UserServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Scan(ScanServiceError),
    Users(UserServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Scan(err) => write!(f, "scan error: {}", err),
            AppError::Users(err) => write!(f, "user error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Scan(err) => Some(err),
            AppError::Users(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Scan(err) => ApiError::from(err).into_response(),
            AppError::Users(err) => ApiError::from(err).into_response(),
            other => {
                let body = Json(json!({ "kind": "internal", "error": other.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ScanServiceError> for AppError {
    fn from(value: ScanServiceError) -> Self {
        Self::Scan(value)
    }
}

impl From<UserServiceError> for AppError {
    fn from(value: UserServiceError) -> Self {
        Self::Users(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yard::scans::ScanValidationError;

    #[test]
    fn domain_errors_keep_their_status_codes() {
        let response =
            AppError::from(ScanServiceError::Validation(ScanValidationError::EmptyIdentifier))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::from(ConfigError::InvalidPort).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
