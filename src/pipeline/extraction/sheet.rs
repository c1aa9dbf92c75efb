//! Row Extractor: reviewer rows out of a workbook held in memory.
//!
//! Sheet choice: first sheet whose name contains the marker, else the first
//! sheet. The first row of that sheet is the header. Rows are kept when the
//! reviewer cell equals the target reviewer (trimmed, case-insensitive), which
//! works both for per-reviewer split files and for shared files where other
//! reviewers' rows are only hidden. Row visibility is never consulted.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use super::columns::{resolve_columns, ColumnMap};
use super::ParseError;
use crate::config::DEFAULT_SHEET_MARKER;
use crate::models::ReviewRow;

/// Extracts review rows from spreadsheet bytes.
#[derive(Debug, Clone)]
pub struct RowExtractor {
    sheet_marker: String,
}

impl Default for RowExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SHEET_MARKER)
    }
}

impl RowExtractor {
    pub fn new(sheet_marker: impl Into<String>) -> Self {
        Self {
            sheet_marker: sheet_marker.into().to_lowercase(),
        }
    }

    /// Extract every row belonging to `reviewer`.
    ///
    /// Fails when the workbook cannot be opened, has no sheets, or lacks a
    /// reviewer/response column. A sheet with no header yields no rows.
    pub fn extract(
        &self,
        bytes: &[u8],
        reviewer: &str,
        file_name: &str,
        folder_url: &str,
    ) -> Result<Vec<ReviewRow>, ParseError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet_names = workbook.sheet_names();
        let sheet = select_sheet(&sheet_names, &self.sheet_marker)
            .ok_or(ParseError::NoSheets)?
            .to_string();

        let range = workbook.worksheet_range(&sheet)?;
        let rows = rows_for_reviewer(&range, &sheet, reviewer, file_name, folder_url)?;

        tracing::debug!(
            sheet = %sheet,
            reviewer,
            file_name,
            rows = rows.len(),
            "Extracted reviewer rows"
        );

        Ok(rows)
    }
}

/// Pick the marked sheet, falling back to the first one.
pub fn select_sheet<'a>(names: &'a [String], marker: &str) -> Option<&'a str> {
    let marker = marker.to_lowercase();
    names
        .iter()
        .find(|n| !marker.is_empty() && n.to_lowercase().contains(&marker))
        .or_else(|| names.first())
        .map(String::as_str)
}

fn rows_for_reviewer(
    range: &Range<Data>,
    sheet: &str,
    reviewer: &str,
    file_name: &str,
    folder_url: &str,
) -> Result<Vec<ReviewRow>, ParseError> {
    let mut rows_iter = range.rows();
    let header: Vec<String> = match rows_iter.next() {
        Some(cells) => cells.iter().map(cell_text).collect(),
        None => return Ok(Vec::new()),
    };

    let columns = resolve_columns(&header);
    let (Some(reviewer_col), Some(response_col)) = (columns.reviewer, columns.response) else {
        let missing = columns
            .missing_required()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ParseError::MissingColumns {
            sheet: sheet.to_string(),
            missing,
        });
    };

    let target = reviewer.trim().to_lowercase();
    if target.is_empty() {
        return Ok(Vec::new());
    }

    // Range coordinates are relative to the first used cell.
    let first_row = range.start().map(|(row, _)| row).unwrap_or(0);

    let rows = rows_iter
        .enumerate()
        .filter_map(|(offset, cells)| {
            if optional_cell(cells, Some(reviewer_col)).to_lowercase() != target {
                return None;
            }
            // header is at first_row (0-based); data offset 0 is one below it
            let row_number = first_row + offset as u32 + 2;
            Some(build_row(cells, &columns, response_col, reviewer, row_number, file_name, folder_url))
        })
        .collect();

    Ok(rows)
}

fn build_row(
    cells: &[Data],
    columns: &ColumnMap,
    response_col: usize,
    reviewer: &str,
    row_number: u32,
    file_name: &str,
    folder_url: &str,
) -> ReviewRow {
    let response = optional_cell(cells, Some(response_col));
    ReviewRow {
        reviewer: reviewer.to_string(),
        user_name: optional_cell(cells, columns.user_name),
        user_email: optional_cell(cells, columns.user_email),
        is_missing: ReviewRow::response_missing(&response),
        response,
        details: optional_cell(cells, columns.details),
        row_number,
        file_name: file_name.to_string(),
        folder_url: folder_url.to_string(),
    }
}

fn optional_cell(cells: &[Data], index: Option<usize>) -> String {
    index
        .and_then(|i| cells.get(i))
        .map(cell_text)
        .unwrap_or_default()
}

/// Trimmed display text of a cell; empty cells become "".
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}
