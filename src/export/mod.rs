//! Export pipeline: resolve rows against a column configuration, then
//! emit a delimited-text artifact and a spreadsheet artifact side by side.

pub mod delimited;
pub mod resolve;
pub mod workbook;

pub use resolve::{DerivedField, ExportColumn};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::info;

use crate::data::values::compare_values;
use crate::error::ExportError;
use crate::export::resolve::{resolve_cell, resolve_sort_cell};
use crate::sync::keys::SortOrder;

/// Which rows an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    /// The resolved selection set.
    Selection,
    /// Only what is on screen.
    CurrentPage,
    /// Everything matching the current filters, gathered page by page.
    AllPages,
}

impl RowSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Selection => "selected rows",
            Self::CurrentPage => "current page",
            Self::AllPages => "all pages",
        }
    }
}

pub struct ExportRequest {
    /// Artifact stem, e.g. `courses` becomes `courses_20240301_103000.csv`.
    pub name: String,
    pub columns: Vec<ExportColumn>,
    pub rows: Vec<Value>,
    /// Active single-column sort to re-apply client-side. Rows gathered
    /// out of page context lose their server order, so exports re-sort.
    pub sort: Option<(String, SortOrder)>,
}

/// Per-format results. One artifact failing does not take the other down.
pub struct ExportOutcome {
    pub rows: usize,
    pub delimited: Result<PathBuf, ExportError>,
    pub workbook: Result<PathBuf, ExportError>,
}

impl ExportOutcome {
    pub fn status_line(&self) -> String {
        match (&self.delimited, &self.workbook) {
            (Ok(csv), Ok(xlsx)) => format!(
                "✓ Exported {} rows to {} and {}",
                self.rows,
                file_name(csv),
                file_name(xlsx)
            ),
            (Ok(csv), Err(err)) => format!(
                "✓ Exported {} rows to {}; workbook failed: {}",
                self.rows,
                file_name(csv),
                err
            ),
            (Err(err), Ok(xlsx)) => format!(
                "✓ Exported {} rows to {}; CSV failed: {}",
                self.rows,
                file_name(xlsx),
                err
            ),
            (Err(csv_err), Err(xlsx_err)) => {
                format!("Export failed: {} / {}", csv_err, xlsx_err)
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn run_export(request: ExportRequest, out_dir: &Path) -> Result<ExportOutcome, ExportError> {
    let ExportRequest {
        name,
        columns,
        mut rows,
        sort,
    } = request;

    if rows.is_empty() {
        return Err(ExportError::NoRows);
    }
    fs::create_dir_all(out_dir)?;

    if let Some((field, order)) = &sort {
        rows.sort_by(|a, b| {
            let left = resolve_sort_cell(a, &columns, field);
            let right = resolve_sort_cell(b, &columns, field);
            let ordering = compare_values(Some(&left), Some(&right));
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    let resolved: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| columns.iter().map(|column| resolve_cell(row, column)).collect())
        .collect();

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let csv_path = out_dir.join(format!("{}_{}.csv", name, timestamp));
    let xlsx_path = out_dir.join(format!("{}_{}.xlsx", name, timestamp));

    let delimited = delimited::write_csv(&csv_path, &columns, &resolved).map(|_| csv_path);
    let workbook = workbook::write_xlsx(&xlsx_path, &columns, &resolved).map(|_| xlsx_path);

    info!(
        target: "export",
        "exported {} rows (csv: {}, xlsx: {})",
        resolved.len(),
        delimited.is_ok(),
        workbook.is_ok()
    );
    Ok(ExportOutcome {
        rows: resolved.len(),
        delimited,
        workbook,
    })
}
