use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryScanLog, InMemoryUserRepository};
use crate::routes::with_yard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use yard_tracker::config::AppConfig;
use yard_tracker::error::AppError;
use yard_tracker::telemetry;
use yard_tracker::yard::scans::ScanService;
use yard_tracker::yard::users::UserService;
use yard_tracker::yard::{Clock, SystemClock};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let rules = Arc::new(config.yard.rules()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let user_repository = Arc::new(InMemoryUserRepository::default());
    let user_service = Arc::new(UserService::new(
        Arc::clone(&user_repository),
        Arc::clone(&rules),
        Arc::clone(&clock),
        &config.auth.settings(),
    ));
    let admin = user_service.bootstrap_admin(
        &config.yard.bootstrap_admin,
        "Yard Administrator",
        &config.auth.bootstrap_admin_password,
    )?;
    info!(user_id = %admin.id, username = %admin.username, "admin account available");

    let scan_service = Arc::new(ScanService::new(
        Arc::new(InMemoryScanLog::default()),
        user_repository,
        Arc::clone(&rules),
        clock,
    ));

    let app = with_yard_routes(scan_service, user_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        shift_scheme = config.yard.shift_scheme.as_str(),
        rules_version = rules.version,
        "yard tracker ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
