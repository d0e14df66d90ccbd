use crate::infra::{
    local_to_utc, parse_date, parse_local_timestamp, InMemoryScanLog, InMemoryUserRepository,
};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use yard_tracker::config::{AppConfig, ConfigError};
use yard_tracker::error::AppError;
use yard_tracker::yard::report::{ExportFormat, ReportKind};
use yard_tracker::yard::scans::{
    CarQuery, ExportQuery, ScanOutcome, ScanRequest, ScanService, ScanServiceError,
};
use yard_tracker::yard::users::{NewUser, Role, Session, UserService};
use yard_tracker::yard::{Clock, FixedClock, ShiftWindow, SystemClock};

const MAX_FAST_FORWARD_HOURS: i64 = 24 * 365;
const DEMO_PASSWORD: &str = "demo-pass";

#[derive(Args, Debug, Default)]
pub(crate) struct ShiftsArgs {
    /// Local yard time to resolve (YYYY-MM-DDTHH:MM). Defaults to now.
    #[arg(long, value_parser = parse_local_timestamp)]
    pub(crate) at: Option<NaiveDateTime>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Business date to simulate (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Hours to fast-forward after the last scan before printing statuses (at most a year).
    #[arg(
        long,
        default_value_t = 13,
        value_parser = clap::value_parser!(i64).range(0..=MAX_FAST_FORWARD_HOURS)
    )]
    pub(crate) hours_later: i64,
    /// Write the general report to this path; `.csv` selects CSV, anything else xlsx.
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
}

pub(crate) fn run_shifts(args: ShiftsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let rules = config.yard.rules()?;

    let at = match args.at {
        Some(local) => local_to_utc(local, &rules),
        None => SystemClock.now(),
    };
    let current = rules.shift_at(at).map_err(ConfigError::from)?;

    println!(
        "Shift scheme {} (rules v{}, UTC offset {})",
        config.yard.shift_scheme.as_str(),
        rules.version,
        rules.window.offset()
    );
    for window in rules.shifts.windows() {
        let marker = if window.id == current.id { "*" } else { " " };
        println!("{marker} {}", describe_window(window));
    }
    println!(
        "At {} the active shift is {} ({})",
        rules.local_time(at).format("%Y-%m-%d %H:%M"),
        current.id,
        current.label
    );
    Ok(())
}

fn describe_window(window: &ShiftWindow) -> String {
    let wrap = if window.wraps_midnight() {
        " (overnight)"
    } else {
        ""
    };
    format!("shift {}: {}{}", window.id, window.label, wrap)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        date,
        hours_later,
        export,
    } = args;

    let config = AppConfig::load()?;
    let rules = Arc::new(config.yard.rules()?);
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    let windows = rules.shifts.windows();
    let first = windows[0].clone();
    let second = windows.get(1).cloned().unwrap_or_else(|| first.clone());
    let opening = local_to_utc(
        date.and_time(
            NaiveTime::from_hms_opt(u32::from(first.start_hour), 30, 0).unwrap_or_default(),
        ),
        &rules,
    );

    let business_date = rules.business_date(opening);
    let clock = Arc::new(FixedClock::new(opening));
    let shared_clock: Arc<dyn Clock> = clock.clone();
    let repository = Arc::new(InMemoryUserRepository::default());
    let log = Arc::new(InMemoryScanLog::default());
    let users = UserService::new(
        Arc::clone(&repository),
        Arc::clone(&rules),
        Arc::clone(&shared_clock),
        &config.auth.settings(),
    );
    let scans = ScanService::new(Arc::clone(&log), repository, Arc::clone(&rules), shared_clock);

    println!("Yard tracker demo for {date}");
    let admin = Session::from(
        &users.bootstrap_admin(
            &config.yard.bootstrap_admin,
            "Yard Administrator",
            &config.auth.bootstrap_admin_password,
        )?,
    );
    let supervisor = Session::from(&users.create(
        &admin,
        NewUser {
            username: "supervisor".to_string(),
            full_name: "Sam Ortiz".to_string(),
            role: Role::Supervisor,
            assigned_shift: None,
            supervisor_ref: None,
            password: DEMO_PASSWORD.to_string(),
        },
    )?);
    let early = Session::from(&users.create(
        &admin,
        NewUser {
            username: "dana".to_string(),
            full_name: "Dana Reyes".to_string(),
            role: Role::Worker,
            assigned_shift: Some(first.id),
            supervisor_ref: Some(supervisor.user_id),
            password: DEMO_PASSWORD.to_string(),
        },
    )?);
    let late = Session::from(&users.create(
        &admin,
        NewUser {
            username: "lee".to_string(),
            full_name: "Lee Park".to_string(),
            role: Role::Worker,
            assigned_shift: Some(second.id),
            supervisor_ref: Some(supervisor.user_id),
            password: DEMO_PASSWORD.to_string(),
        },
    )?);
    println!(
        "- Accounts: {} (admin), {} (supervisor), {} on shift {}, {} on shift {}",
        admin.full_name, supervisor.full_name, early.full_name, first.id, late.full_name, second.id
    );
    let grant = users.login(&early.username, DEMO_PASSWORD)?;
    println!(
        "- {} signed in; token valid until {}",
        early.full_name,
        rules.local_time(grant.expires_at).format("%Y-%m-%d %H:%M")
    );

    println!("\nScans during {}", describe_window(&first));
    for car in ["abc123", "xyz1"] {
        print_outcome(&early, &scans.scan(&early, ScanRequest::parked(car))?);
    }
    print_outcome(
        &early,
        &scans.scan(
            &early,
            ScanRequest::holding("HLD7", Some("MV Aurora".to_string())),
        )?,
    );
    clock.advance(Duration::minutes(20));
    print_outcome(&early, &scans.scan(&early, ScanRequest::parked("ABC123"))?);

    if second.id != first.id {
        match scans.scan(&late, ScanRequest::parked("NEW42")) {
            Err(ScanServiceError::ShiftViolation(violation)) => {
                println!("- {} was turned away: {}", late.full_name, violation)
            }
            Err(other) => return Err(other.into()),
            Ok(outcome) => print_outcome(&late, &outcome),
        }

        let second_start = local_to_utc(
            date.and_time(
                NaiveTime::from_hms_opt(u32::from(second.start_hour), 15, 0).unwrap_or_default(),
            ),
            &rules,
        );
        if second_start > clock.now() {
            clock.set(second_start);
        }
        println!("\nScans during {}", describe_window(&second));
        print_outcome(&late, &scans.scan(&late, ScanRequest::parked("NEW42"))?);
        print_outcome(&late, &scans.scan(&late, ScanRequest::parked("XYZ1"))?);
    }

    clock.advance(Duration::hours(hours_later));
    println!(
        "\nYard status {} hours later ({})",
        hours_later,
        rules.local_time(clock.now()).format("%Y-%m-%d %H:%M")
    );
    let cars = scans.cars(
        &supervisor,
        CarQuery {
            date: Some(business_date),
            ..CarQuery::default()
        },
    )?;
    for car in &cars {
        println!(
            "  - {:<8} {:<8} {:>5.1}h since last scan | {} scan(s) | last by {} | {}",
            car.car_identifier.as_str(),
            car.status_label,
            car.hours_since_last_scan,
            car.scan_count,
            car.last_worker.name,
            car.location().label()
        );
    }

    let summary = scans.dashboard(&supervisor, Some(business_date))?;
    println!(
        "Dashboard: {} cars ({} normal / {} warning / {} overdue), {} in holding, {} scans, {} active workers",
        summary.total_cars,
        summary.normal_cars,
        summary.warning_cars,
        summary.overdue_cars,
        summary.holding_cars,
        summary.total_scans,
        summary.active_workers.unwrap_or_default()
    );
    println!("Scan log holds {} immutable events", log.len());

    if let Some(path) = export {
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Xlsx,
        };
        let file = scans.export(
            &supervisor,
            ReportKind::General,
            ExportQuery {
                date: Some(business_date),
                format,
                ..Default::default()
            },
        )?;
        std::fs::write(&path, &file.bytes)?;
        println!("Wrote {} ({} bytes) to {}", file.filename, file.bytes.len(), path.display());
    }

    Ok(())
}

fn print_outcome(session: &Session, outcome: &ScanOutcome) {
    if outcome.is_new {
        println!(
            "- {} scanned {} into {} (new today)",
            session.full_name,
            outcome.car.car_identifier,
            outcome.event.placement.location().label()
        );
        return;
    }

    println!(
        "- {} scanned {} again; seen {} time(s) before:",
        session.full_name,
        outcome.car.car_identifier,
        outcome.previous_scans.len()
    );
    for previous in &outcome.previous_scans {
        println!(
            "    {} on shift {}, {}",
            previous.worker, previous.shift, previous.time_ago
        );
    }
}
