use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::{Duration, FixedOffset};

use crate::yard::rules::YardRules;
use crate::yard::users::auth::{AuthSettings, DEFAULT_TOKEN_TTL_HOURS};
use crate::yard::shift::{ShiftConfigError, ShiftScheme, ShiftSchemeKind};
use crate::yard::status::{StatusConfigError, StatusThresholds, DEFAULT_OVERDUE_HOURS, DEFAULT_WARNING_HOURS};
use crate::yard::window::{ReportingWindow, WindowConfigError};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub yard: YardConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            yard: YardConfig::from_env()?,
            auth: AuthConfig::from_env(environment)?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Yard rule settings: shift layout, status thresholds and the reporting day.
#[derive(Debug, Clone, PartialEq)]
pub struct YardConfig {
    pub shift_scheme: ShiftSchemeKind,
    pub warning_hours: f64,
    pub overdue_hours: f64,
    pub day_boundary_hour: u8,
    pub utc_offset: FixedOffset,
    pub bootstrap_admin: String,
}

impl Default for YardConfig {
    fn default() -> Self {
        Self {
            shift_scheme: ShiftSchemeKind::FourHourBlocks,
            warning_hours: DEFAULT_WARNING_HOURS,
            overdue_hours: DEFAULT_OVERDUE_HOURS,
            day_boundary_hour: 0,
            utc_offset: ReportingWindow::default().offset(),
            bootstrap_admin: "admin".to_string(),
        }
    }
}

impl YardConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let shift_scheme = match env::var("APP_SHIFT_SCHEME") {
            Ok(value) => value
                .parse::<ShiftSchemeKind>()
                .map_err(|value| ConfigError::InvalidShiftScheme { value })?,
            Err(_) => defaults.shift_scheme,
        };
        let warning_hours = hours_var("APP_STATUS_WARNING_HOURS", defaults.warning_hours)?;
        let overdue_hours = hours_var("APP_STATUS_OVERDUE_HOURS", defaults.overdue_hours)?;
        let day_boundary_hour = match env::var("APP_DAY_BOUNDARY_HOUR") {
            Ok(value) => value
                .trim()
                .parse::<u8>()
                .map_err(|_| ConfigError::InvalidBoundaryHour { value })?,
            Err(_) => defaults.day_boundary_hour,
        };
        let utc_offset = match env::var("APP_UTC_OFFSET") {
            Ok(value) => parse_utc_offset(&value).ok_or(ConfigError::InvalidUtcOffset { value })?,
            Err(_) => defaults.utc_offset,
        };
        let bootstrap_admin = env::var("APP_BOOTSTRAP_ADMIN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.bootstrap_admin);

        let config = Self {
            shift_scheme,
            warning_hours,
            overdue_hours,
            day_boundary_hour,
            utc_offset,
            bootstrap_admin,
        };
        config.rules()?;
        Ok(config)
    }

    /// Build the validated rule set every yard component evaluates against.
    pub fn rules(&self) -> Result<YardRules, ConfigError> {
        let thresholds = StatusThresholds::new(self.warning_hours, self.overdue_hours)?;
        let shifts = ShiftScheme::new(self.shift_scheme.scheme().windows().to_vec())?;
        let window = ReportingWindow::new(self.day_boundary_hour, self.utc_offset)?;
        Ok(YardRules::new(thresholds, shifts, window))
    }
}

const DEV_TOKEN_SECRET: &str = "yard-tracker-development-secret";
const DEV_ADMIN_PASSWORD: &str = "admin123";

/// Login and token settings. Production refuses to start on the development fallbacks.
#[derive(Clone, PartialEq)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub bootstrap_admin_password: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish_non_exhaustive()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: DEV_TOKEN_SECRET.to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            bootstrap_admin_password: DEV_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl AuthConfig {
    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let token_secret = secret_var("APP_TOKEN_SECRET", environment, defaults.token_secret)?;
        let bootstrap_admin_password = secret_var(
            "APP_BOOTSTRAP_ADMIN_PASSWORD",
            environment,
            defaults.bootstrap_admin_password,
        )?;
        let token_ttl_hours = match env::var("APP_TOKEN_TTL_HOURS") {
            Ok(value) => value
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| (1..=24 * 30).contains(hours))
                .ok_or(ConfigError::InvalidTokenTtl { value })?,
            Err(_) => defaults.token_ttl_hours,
        };

        Ok(Self {
            token_secret,
            token_ttl_hours,
            bootstrap_admin_password,
        })
    }

    pub fn settings(&self) -> AuthSettings {
        AuthSettings::new(
            self.token_secret.clone(),
            Duration::hours(self.token_ttl_hours),
        )
    }
}

fn secret_var(
    name: &'static str,
    environment: AppEnvironment,
    fallback: String,
) -> Result<String, ConfigError> {
    match env::var(name).ok().filter(|value| !value.trim().is_empty()) {
        Some(value) => Ok(value),
        None if environment == AppEnvironment::Production => {
            Err(ConfigError::MissingSecret { name })
        }
        None => Ok(fallback),
    }
}

fn hours_var(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidHours { name, value }),
        Err(_) => Ok(default),
    }
}

/// Accepts `Z`, `UTC`, `+HH:MM`, `-HH:MM` and `+HHMM`.
fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.chars().next()? {
        '+' => (1, &value[1..]),
        '-' => (-1, &value[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidShiftScheme { value: String },
    InvalidHours { name: &'static str, value: String },
    InvalidBoundaryHour { value: String },
    InvalidUtcOffset { value: String },
    InvalidTokenTtl { value: String },
    MissingSecret { name: &'static str },
    Thresholds(StatusConfigError),
    Shifts(ShiftConfigError),
    Window(WindowConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidShiftScheme { value } => write!(
                f,
                "APP_SHIFT_SCHEME '{}' is not one of four_hour_blocks, two_shift",
                value
            ),
            ConfigError::InvalidHours { name, value } => {
                write!(f, "{} must be a number of hours, got '{}'", name, value)
            }
            ConfigError::InvalidBoundaryHour { value } => {
                write!(f, "APP_DAY_BOUNDARY_HOUR must be an hour 0-23, got '{}'", value)
            }
            ConfigError::InvalidUtcOffset { value } => {
                write!(f, "APP_UTC_OFFSET must look like +02:00, got '{}'", value)
            }
            ConfigError::InvalidTokenTtl { value } => write!(
                f,
                "APP_TOKEN_TTL_HOURS must be between 1 and 720, got '{}'",
                value
            ),
            ConfigError::MissingSecret { name } => {
                write!(f, "{} must be set in production", name)
            }
            ConfigError::Thresholds(err) => write!(f, "invalid status thresholds: {}", err),
            ConfigError::Shifts(err) => write!(f, "invalid shift scheme: {}", err),
            ConfigError::Window(err) => write!(f, "invalid reporting window: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Thresholds(err) => Some(err),
            ConfigError::Shifts(err) => Some(err),
            ConfigError::Window(err) => Some(err),
            ConfigError::InvalidPort
            | ConfigError::InvalidShiftScheme { .. }
            | ConfigError::InvalidHours { .. }
            | ConfigError::InvalidBoundaryHour { .. }
            | ConfigError::InvalidUtcOffset { .. }
            | ConfigError::InvalidTokenTtl { .. }
            | ConfigError::MissingSecret { .. } => None,
        }
    }
}

impl From<StatusConfigError> for ConfigError {
    fn from(value: StatusConfigError) -> Self {
        Self::Thresholds(value)
    }
}

impl From<ShiftConfigError> for ConfigError {
    fn from(value: ShiftConfigError) -> Self {
        Self::Shifts(value)
    }
}

impl From<WindowConfigError> for ConfigError {
    fn from(value: WindowConfigError) -> Self {
        Self::Window(value)
    }
}
