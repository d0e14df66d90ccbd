//! Dashboard counts and spreadsheet exports built from aggregated car records.

mod export;
mod summary;

pub use export::{
    render_export, ExportError, ExportFile, ExportFormat, ReportKind, GENERAL_HEADERS,
    HOLDING_HEADERS,
};
pub use summary::DashboardSummary;
