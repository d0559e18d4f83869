//! Value helpers shared by filtering, sorting and export: dotted-path
//! resolution, display stringification, and the mixed-type comparator.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

/// Resolve a field by direct name first, then as a dotted path into
/// nested objects. `teacher.name` reads `item["teacher"]["name"]` when no
/// literal `teacher.name` field exists.
pub fn resolve_path<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(direct) = item.get(path) {
        return Some(direct);
    }
    if !path.contains('.') {
        return None;
    }
    let mut cursor = item;
    for segment in path.split('.') {
        cursor = cursor.get(segment)?;
    }
    Some(cursor)
}

/// Render one value for a cell. Timestamps normalize to UTC ISO-8601,
/// arrays join their rendered elements, objects fall back to JSON, and
/// null or missing renders empty.
pub fn stringify(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(ts) => ts
                .to_utc()
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            Err(_) => s.clone(),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| stringify(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Order two cell values: numerically when both sides are numeric,
/// case-insensitively as text otherwise. Missing values order before
/// everything so an ascending sort floats the blanks to the top.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            let x = stringify(Some(a)).to_lowercase();
            let y = stringify(Some(b)).to_lowercase();
            x.cmp(&y)
        }
    }
}
