//! Reporting: rollup of entity results, manual overrides and exports.
//!
//! ```text
//! EntityResult[] ──► aggregate() ──► Aggregate ("Cat > App" → AggregateNode)
//!                       ▲                 │
//!        ManualOverrides┘                 ├─► export_global()      → GlobalReportRow[]
//!                                         └─► export_application() → DetailReportRow[]
//! ```
//!
//! The aggregate is rebuilt on every run and never cached.

pub mod aggregate;
pub mod export;
pub mod overrides;

pub use aggregate::{aggregate, Aggregate, AggregateNode, ReviewerDetail, ReviewerStatus};
pub use export::{
    export_application, export_global, global_report_file_name, output_dir, report_file_name,
    sanitize_file_name, write_report, DetailReportRow, ExportError, GlobalReportRow, ReportRow,
};
pub use overrides::{AppOverride, ManualOverrides, OverrideError};
