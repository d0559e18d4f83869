//! Column configuration and per-cell value resolution.

use serde_json::Value;

use crate::data::values::resolve_path;

/// A field computed from the row instead of read off it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedField {
    /// Number of elements in a nested collection, e.g. how many members a
    /// project team has. Missing or non-array values count zero.
    CollectionSize { path: String },
}

/// One exported column: a field id, the header it is written under, an
/// optional width hint for the spreadsheet, and an optional derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportColumn {
    pub id: String,
    pub header: String,
    pub width: Option<u16>,
    pub derived: Option<DerivedField>,
}

impl ExportColumn {
    pub fn new(id: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            header: header.into(),
            width: None,
            derived: None,
        }
    }

    /// A column counting the collection at `path`.
    pub fn counting(id: impl Into<String>, header: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            derived: Some(DerivedField::CollectionSize { path: path.into() }),
            ..Self::new(id, header)
        }
    }

    pub fn with_width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }
}

/// Resolve one cell. Derived fields compute, everything else walks the
/// row; a missing field resolves to null and renders empty.
pub fn resolve_cell(item: &Value, column: &ExportColumn) -> Value {
    match &column.derived {
        Some(DerivedField::CollectionSize { path }) => {
            let count = resolve_path(item, path)
                .and_then(Value::as_array)
                .map(|a| a.len())
                .unwrap_or(0);
            Value::from(count)
        }
        None => resolve_path(item, &column.id).cloned().unwrap_or(Value::Null),
    }
}

/// Resolve the value a row sorts on. A sort field that names an exported
/// column goes through that column's derivation; anything else is a plain
/// field walk.
pub fn resolve_sort_cell(item: &Value, columns: &[ExportColumn], field: &str) -> Value {
    match columns.iter().find(|c| c.id == field) {
        Some(column) => resolve_cell(item, column),
        None => resolve_path(item, field).cloned().unwrap_or(Value::Null),
    }
}
