use chrono::{DateTime, NaiveDate, Utc};
use mime::Mime;
use rust_xlsxwriter::{Color, Format, FormatBorder, FormatPattern, Workbook, XlsxError};
use serde::Deserialize;
use std::str::FromStr;

use crate::yard::rules::YardRules;
use crate::yard::scans::{CarRecord, Placement};
use crate::yard::shift::ShiftId;
use crate::yard::status::Status;
use crate::yard::users::UserId;

pub const GENERAL_HEADERS: [&str; 10] = [
    "Car ID",
    "First Scan",
    "Last Scan",
    "Scans",
    "Hours Since Last Scan",
    "Status",
    "Last Worker",
    "Shifts",
    "Location",
    "Date",
];

pub const HOLDING_HEADERS: [&str; 9] = [
    "Car ID",
    "Vessel",
    "Holding Area",
    "Stack",
    "Last Worker",
    "Last Scan",
    "Hours Since Last Scan",
    "Status",
    "Date",
];

const HEADER_FILL: u32 = 0x1F4E78;
const WARNING_FILL: u32 = 0xFFC000;
const OVERDUE_FILL: u32 = 0xFF6B6B;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    General,
    Holding,
}

impl ReportKind {
    pub const fn file_prefix(self) -> &'static str {
        match self {
            Self::General => "parking_report",
            Self::Holding => "holding_report",
        }
    }

    pub const fn sheet_name(self) -> &'static str {
        match self {
            Self::General => "Parking Report",
            Self::Holding => "Holding Report",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub fn content_type(self) -> Mime {
        match self {
            Self::Xlsx => XLSX_MIME
                .parse()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM),
            Self::Csv => mime::TEXT_CSV,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            other => Err(other.to_string()),
        }
    }
}

/// Rendered report ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to build workbook: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush csv: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) fn export_filename(
    kind: ReportKind,
    format: ExportFormat,
    date: NaiveDate,
    shift: Option<ShiftId>,
    worker: Option<UserId>,
) -> String {
    let mut name = format!("{}_{}", kind.file_prefix(), date.format("%Y-%m-%d"));
    if let Some(shift) = shift {
        name.push_str(&format!("_shift{shift}"));
    }
    if let Some(worker) = worker {
        name.push_str(&format!("_worker{worker}"));
    }
    format!("{name}.{}", format.extension())
}

struct Row {
    cells: Vec<String>,
    status: Status,
}

fn local(rules: &YardRules, timestamp: DateTime<Utc>) -> String {
    rules.local_time(timestamp).format(TIME_FORMAT).to_string()
}

fn general_rows(records: &[CarRecord], rules: &YardRules, date: NaiveDate) -> Vec<Row> {
    records
        .iter()
        .map(|car| Row {
            cells: vec![
                car.car_identifier.to_string(),
                local(rules, car.first_scan_time),
                local(rules, car.last_scan_time),
                car.scan_count.to_string(),
                format!("{:.1}", car.hours_since_last_scan),
                car.status.label().to_string(),
                car.last_worker.name.clone(),
                car.shifts
                    .iter()
                    .map(ShiftId::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                car.location().label().to_string(),
                date.format("%Y-%m-%d").to_string(),
            ],
            status: car.status,
        })
        .collect()
}

fn holding_rows(records: &[CarRecord], rules: &YardRules, date: NaiveDate) -> Vec<Row> {
    records
        .iter()
        .filter_map(|car| match &car.placement {
            Placement::Holding {
                vessel_ref,
                holding_area_ref,
                stack_number,
            } => Some(Row {
                cells: vec![
                    car.car_identifier.to_string(),
                    vessel_ref.clone().unwrap_or_default(),
                    holding_area_ref.clone().unwrap_or_default(),
                    stack_number.clone().unwrap_or_default(),
                    car.last_worker.name.clone(),
                    local(rules, car.last_scan_time),
                    format!("{:.1}", car.hours_since_last_scan),
                    car.status.label().to_string(),
                    date.format("%Y-%m-%d").to_string(),
                ],
                status: car.status,
            }),
            Placement::Parked => None,
        })
        .collect()
}

/// Render the general or holding report. Holding reports only list cars whose latest scan
/// placed them in holding.
pub fn render_export(
    kind: ReportKind,
    format: ExportFormat,
    records: &[CarRecord],
    rules: &YardRules,
    date: NaiveDate,
    shift: Option<ShiftId>,
    worker: Option<UserId>,
) -> Result<ExportFile, ExportError> {
    let (headers, rows): (&[&str], Vec<Row>) = match kind {
        ReportKind::General => (GENERAL_HEADERS.as_slice(), general_rows(records, rules, date)),
        ReportKind::Holding => (HOLDING_HEADERS.as_slice(), holding_rows(records, rules, date)),
    };

    let bytes = match format {
        ExportFormat::Xlsx => write_xlsx(kind, headers, &rows)?,
        ExportFormat::Csv => write_csv(headers, &rows)?,
    };

    Ok(ExportFile {
        filename: export_filename(kind, format, date, shift, worker),
        content_type: format.content_type(),
        bytes,
    })
}

fn write_csv(headers: &[&str], rows: &[Row]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row.cells)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))
}

fn status_fill(status: Status) -> Option<Color> {
    match status {
        Status::Normal => None,
        Status::Warning => Some(Color::RGB(WARNING_FILL)),
        Status::Overdue => Some(Color::RGB(OVERDUE_FILL)),
    }
}

fn write_xlsx(kind: ReportKind, headers: &[&str], rows: &[Row]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(kind.sheet_name())?;

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0xFFFFFF))
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_pattern(FormatPattern::Solid)
        .set_border(FormatBorder::Thin);

    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_with_format(0, col as u16, *header, &header_format)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (index, row) in rows.iter().enumerate() {
        let mut format = Format::new().set_border(FormatBorder::Thin);
        if let Some(fill) = status_fill(row.status) {
            format = format
                .set_background_color(fill)
                .set_pattern(FormatPattern::Solid);
        }

        for (col, value) in row.cells.iter().enumerate() {
            worksheet.write_with_format(index as u32 + 1, col as u16, value.as_str(), &format)?;
            if let Some(width) = widths.get_mut(col) {
                *width = (*width).max(value.chars().count());
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, (*width).min(50) as f64 + 2.0)?;
    }

    Ok(workbook.save_to_buffer()?)
}
