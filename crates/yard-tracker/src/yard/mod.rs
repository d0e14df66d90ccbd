//! Vehicle yard tracking: status classification, shift resolution and scan attribution.

pub mod clock;
pub mod http;
pub mod report;
pub mod rules;
pub mod scans;
pub mod shift;
pub mod status;
pub mod users;
pub mod window;

pub use clock::{Clock, FixedClock, SystemClock};
pub use rules::{YardRules, RULES_VERSION};
pub use shift::{
    authorize_scan, resolve_shift, ShiftConfigError, ShiftId, ShiftScheme, ShiftSchemeKind,
    ShiftViolation, ShiftWindow,
};
pub use status::{classify, Status, StatusConfigError, StatusThresholds};
pub use window::{ReportingWindow, WindowConfigError};
