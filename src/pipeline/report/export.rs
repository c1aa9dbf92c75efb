//! Export rows for the global summary and per-application detail reports,
//! plus the workbook writer and file naming.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde::Serialize;
use thiserror::Error;

use super::aggregate::{Aggregate, ReviewerStatus};
use crate::models::AppKey;
use crate::pipeline::scan::ScanReport;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] XlsxError),
}

// ═══════════════════════════════════════════
// Row shapes
// ═══════════════════════════════════════════

/// A row type that can be written as one worksheet line.
pub trait ReportRow {
    const HEADERS: &'static [&'static str];

    fn write(&self, sheet: &mut Worksheet, row: u32) -> Result<(), XlsxError>;
}

/// One reviewer in the global summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalReportRow {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "App Name")]
    pub application: String,
    #[serde(rename = "Reviewer")]
    pub reviewer: String,
    #[serde(rename = "Final Status")]
    pub final_status: String,
    #[serde(rename = "Total Approved")]
    pub total_approved: u32,
    #[serde(rename = "Total Denied")]
    pub total_denied: u32,
    #[serde(rename = "Total Changed")]
    pub total_changed: u32,
}

impl ReportRow for GlobalReportRow {
    const HEADERS: &'static [&'static str] = &[
        "Category",
        "App Name",
        "Reviewer",
        "Final Status",
        "Total Approved",
        "Total Denied",
        "Total Changed",
    ];

    fn write(&self, sheet: &mut Worksheet, row: u32) -> Result<(), XlsxError> {
        sheet.write_string(row, 0, &self.category)?;
        sheet.write_string(row, 1, &self.application)?;
        sheet.write_string(row, 2, &self.reviewer)?;
        sheet.write_string(row, 3, &self.final_status)?;
        sheet.write_number(row, 4, self.total_approved)?;
        sheet.write_number(row, 5, self.total_denied)?;
        sheet.write_number(row, 6, self.total_changed)?;
        Ok(())
    }
}

/// One user line in an application's detail report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailReportRow {
    #[serde(rename = "User Name")]
    pub user_name: String,
    #[serde(rename = "User Email")]
    pub user_email: String,
    #[serde(rename = "Reviewer")]
    pub reviewer: String,
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "Reviewer Response")]
    pub response: String,
    #[serde(rename = "Details of Access Change")]
    pub details: String,
    #[serde(rename = "Final Status")]
    pub final_status: String,
    #[serde(rename = "Row Num")]
    pub row_number: u32,
    #[serde(rename = "Audit Log")]
    pub audit_log: String,
}

impl ReportRow for DetailReportRow {
    const HEADERS: &'static [&'static str] = &[
        "User Name",
        "User Email",
        "Reviewer",
        "File Name",
        "Reviewer Response",
        "Details of Access Change",
        "Final Status",
        "Row Num",
        "Audit Log",
    ];

    fn write(&self, sheet: &mut Worksheet, row: u32) -> Result<(), XlsxError> {
        sheet.write_string(row, 0, &self.user_name)?;
        sheet.write_string(row, 1, &self.user_email)?;
        sheet.write_string(row, 2, &self.reviewer)?;
        sheet.write_string(row, 3, &self.file_name)?;
        sheet.write_string(row, 4, &self.response)?;
        sheet.write_string(row, 5, &self.details)?;
        sheet.write_string(row, 6, &self.final_status)?;
        sheet.write_number(row, 7, self.row_number)?;
        sheet.write_string(row, 8, &self.audit_log)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Builders
// ═══════════════════════════════════════════

/// One row per reviewer, sorted by application, category, reviewer.
/// Final status is the computed one; manual overrides do not apply here.
pub fn export_global(aggregate: &Aggregate) -> Vec<GlobalReportRow> {
    let mut rows: Vec<GlobalReportRow> = aggregate
        .values()
        .flat_map(|node| {
            node.reviewers.iter().map(|(reviewer, detail)| GlobalReportRow {
                category: node.category.clone(),
                application: node.application.clone(),
                reviewer: reviewer.clone(),
                final_status: detail.status.label().to_string(),
                total_approved: detail.counts.approved,
                total_denied: detail.counts.denied,
                total_changed: detail.counts.changed,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        (&a.application, &a.category, &a.reviewer).cmp(&(&b.application, &b.category, &b.reviewer))
    });
    rows
}

/// Every extracted row of one application, in reviewer then row order.
/// Empty when the application has no rows in `report`.
pub fn export_application(report: &ScanReport, app: &AppKey) -> Vec<DetailReportRow> {
    let Some(node) = report.aggregate.get(&app.label()) else {
        return Vec::new();
    };

    let mut rows: Vec<DetailReportRow> = report
        .results
        .iter()
        .filter(|r| r.key.app_key() == *app && r.has_rows())
        .flat_map(|result| {
            let status = node
                .reviewers
                .get(&result.key.reviewer)
                .map(|d| d.status)
                .unwrap_or_else(|| ReviewerStatus::from_counts(&result.counts));
            let final_status = node.final_status_for(&status);

            result.rows.iter().map(move |row| DetailReportRow {
                user_name: row.user_name.clone(),
                user_email: row.user_email.clone(),
                reviewer: row.reviewer.clone(),
                file_name: row.file_name.clone(),
                response: row.response.clone(),
                details: row.details.clone(),
                final_status: final_status.to_string(),
                row_number: row.row_number,
                audit_log: result.audit.log.clone(),
            })
        })
        .collect();

    rows.sort_by(|a, b| (&a.reviewer, a.row_number).cmp(&(&b.reviewer, b.row_number)));
    rows
}

// ═══════════════════════════════════════════
// Files
// ═══════════════════════════════════════════

/// Write `rows` under a header line to a single-sheet workbook at `path`.
pub fn write_report<R: ReportRow>(path: &Path, rows: &[R]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in R::HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        row.write(sheet, i as u32 + 1)?;
    }
    workbook.save(path)?;

    tracing::info!(path = %path.display(), rows = rows.len(), "Report written");
    Ok(())
}

/// Strip characters that are not allowed in file names.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_FILE_CHARS.replace_all(name, "").into_owned()
}

/// `<application>_<unix seconds>.xlsx`
pub fn report_file_name(application: &str, stamp: DateTime<Utc>) -> String {
    format!("{}_{}.xlsx", sanitize_file_name(application), stamp.timestamp())
}

pub fn global_report_file_name(stamp: DateTime<Utc>) -> String {
    format!("Global_Report_{}.xlsx", stamp.timestamp())
}

/// Dated output directory, `<base>/output/YYYY-MM-DD`.
pub fn output_dir(base: &Path, stamp: DateTime<Utc>) -> PathBuf {
    base.join("output").join(stamp.format("%Y-%m-%d").to_string())
}
