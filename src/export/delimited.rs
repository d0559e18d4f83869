//! Delimited-text artifact: one header row of mapped column names, then
//! one CSV-escaped record per row.

use std::path::Path;

use serde_json::Value;

use crate::data::values::stringify;
use crate::error::ExportError;
use crate::export::resolve::ExportColumn;

pub fn write_csv(
    path: &Path,
    columns: &[ExportColumn],
    rows: &[Vec<Value>],
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns.iter().map(|c| c.header.as_str()))?;
    for row in rows {
        writer.write_record(row.iter().map(|cell| stringify(Some(cell))))?;
    }
    writer.flush().map_err(|e| ExportError::Io(e.to_string()))?;
    Ok(())
}
