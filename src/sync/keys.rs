//! State keys: the registry of everything a list view mirrors into its
//! address, with per-key codecs.
//!
//! Each key carries an explicit [`StateKind`] tag instead of inferring the
//! shape from a runtime default, so falsy defaults (`0`, `false`, `""`)
//! decode unambiguously. Scalar kinds serialize as raw text; `Json` kinds
//! serialize as JSON and get percent-encoded by the address layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::sync::deep_equal::deep_equal;

/// Wire shape of a state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Number,
    Boolean,
    Text,
    Json,
}

/// A value that can live in a state channel and round-trip through the
/// address.
pub trait StateValue: Clone + std::fmt::Debug {
    const KIND: StateKind;

    fn encode(&self) -> String;

    /// Decode from address text. `None` means malformed input; the caller
    /// falls back to the key's default.
    fn decode(raw: &str) -> Option<Self>
    where
        Self: Sized;

    fn as_json(&self) -> Value;

    fn equals(&self, other: &Self) -> bool {
        deep_equal(&self.as_json(), &other.as_json())
    }
}

impl StateValue for u32 {
    const KIND: StateKind = StateKind::Number;

    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    fn as_json(&self) -> Value {
        Value::from(*self)
    }
}

impl StateValue for bool {
    const KIND: StateKind = StateKind::Boolean;

    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        match raw.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    fn as_json(&self) -> Value {
        Value::from(*self)
    }
}

impl StateValue for String {
    const KIND: StateKind = StateKind::Text;

    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }

    fn as_json(&self) -> Value {
        Value::from(self.as_str())
    }
}

/// Sort direction, raw text on the wire (`asc` / `desc`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Self::Asc => "▲",
            Self::Desc => "▼",
        }
    }
}

impl StateValue for SortOrder {
    const KIND: StateKind = StateKind::Text;

    fn encode(&self) -> String {
        match self {
            Self::Asc => "asc".to_string(),
            Self::Desc => "desc".to_string(),
        }
    }

    fn decode(raw: &str) -> Option<Self> {
        match raw.trim() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn as_json(&self) -> Value {
        Value::from(self.encode())
    }
}

/// Inclusive date window, ISO dates as entered; empty string = unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub from_date: String,
    #[serde(default)]
    pub to_date: String,
}

impl DateRange {
    pub fn new(from_date: impl Into<String>, to_date: impl Into<String>) -> Self {
        Self {
            from_date: from_date.into(),
            to_date: to_date.into(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from_date.is_empty() && self.to_date.is_empty()
    }
}

/// One per-column filter tuple. The value is free-form JSON so a column can
/// filter on a single choice or a list of choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub id: String,
    pub value: Value,
}

impl ColumnFilter {
    pub fn new(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

macro_rules! json_state_value {
    ($ty:ty) => {
        impl StateValue for $ty {
            const KIND: StateKind = StateKind::Json;

            fn encode(&self) -> String {
                serde_json::to_string(self).unwrap_or_default()
            }

            fn decode(raw: &str) -> Option<Self> {
                serde_json::from_str(raw).ok()
            }

            fn as_json(&self) -> Value {
                serde_json::to_value(self).unwrap_or(Value::Null)
            }
        }
    };
}

json_state_value!(DateRange);
json_state_value!(Vec<ColumnFilter>);
json_state_value!(Vec<String>);
json_state_value!(BTreeMap<String, bool>);
json_state_value!(BTreeMap<String, u16>);

/// One synchronized piece of list-view state: name, kind tag, default and
/// codec. The codec lives on the value type; the key pairs it with a wire
/// name, a default to prune against and an optional acceptance check on
/// decoded input.
#[derive(Debug, Clone)]
pub struct StateKey<T: StateValue> {
    pub name: &'static str,
    default: T,
    accept: Option<fn(&T) -> bool>,
}

impl<T: StateValue> StateKey<T> {
    pub fn new(name: &'static str, default: T) -> Self {
        Self {
            name,
            default,
            accept: None,
        }
    }

    /// Reject decoded values the check fails. A link can carry any text,
    /// so keys with range rules (page numbers start at 1) declare them
    /// here; rejected values degrade to the default like malformed ones.
    pub fn accepting(mut self, check: fn(&T) -> bool) -> Self {
        self.accept = Some(check);
        self
    }

    pub fn kind(&self) -> StateKind {
        T::KIND
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn default_encoded(&self) -> String {
        self.default.encode()
    }

    pub fn is_default(&self, value: &T) -> bool {
        value.equals(&self.default)
    }

    /// Decode address text, falling back to the default on malformed or
    /// rejected input. Stale or hand-edited links must degrade silently,
    /// so this logs a warning and never fails.
    pub fn decode_or_default(&self, raw: &str) -> T {
        let decoded = T::decode(raw)
            .filter(|value| self.accept.map_or(true, |check| check(value)));
        match decoded {
            Some(value) => value,
            None => {
                warn!(
                    target: "sync",
                    "unusable value for '{}' ({:?} expected): {:?}, using default",
                    self.name,
                    T::KIND,
                    raw
                );
                self.default.clone()
            }
        }
    }
}

// Wire names, in registry order. Flushes apply changes in this order so a
// given state always renders the same link.
pub const PAGE: &str = "page";
pub const PAGE_SIZE: &str = "page_size";
pub const SEARCH: &str = "search";
pub const DATE_RANGE: &str = "date_range";
pub const SORT_BY: &str = "sort_by";
pub const SORT_ORDER: &str = "sort_order";
pub const COLUMN_VISIBILITY: &str = "column_visibility";
pub const COLUMN_FILTERS: &str = "column_filters";
pub const COLUMN_ORDER: &str = "column_order";
pub const COLUMN_SIZING: &str = "column_sizing";

pub const REGISTRY: [&str; 10] = [
    PAGE,
    PAGE_SIZE,
    SEARCH,
    DATE_RANGE,
    SORT_BY,
    SORT_ORDER,
    COLUMN_VISIBILITY,
    COLUMN_FILTERS,
    COLUMN_ORDER,
    COLUMN_SIZING,
];

pub fn page() -> StateKey<u32> {
    StateKey::new(PAGE, 1).accepting(|page| *page >= 1)
}

pub fn page_size(default: u32) -> StateKey<u32> {
    StateKey::new(PAGE_SIZE, default).accepting(|size| *size >= 1)
}

pub fn search() -> StateKey<String> {
    StateKey::new(SEARCH, String::new())
}

pub fn date_range() -> StateKey<DateRange> {
    StateKey::new(DATE_RANGE, DateRange::default())
}

pub fn sort_by() -> StateKey<String> {
    StateKey::new(SORT_BY, String::new())
}

pub fn sort_order() -> StateKey<SortOrder> {
    StateKey::new(SORT_ORDER, SortOrder::default())
}

pub fn column_visibility() -> StateKey<BTreeMap<String, bool>> {
    StateKey::new(COLUMN_VISIBILITY, BTreeMap::new())
}

pub fn column_filters() -> StateKey<Vec<ColumnFilter>> {
    StateKey::new(COLUMN_FILTERS, Vec::new())
}

pub fn column_order() -> StateKey<Vec<String>> {
    StateKey::new(COLUMN_ORDER, Vec::new())
}

pub fn column_sizing() -> StateKey<BTreeMap<String, u16>> {
    StateKey::new(COLUMN_SIZING, BTreeMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_codecs() {
        assert_eq!(u32::decode("42"), Some(42));
        assert_eq!(u32::decode("  7 "), Some(7));
        assert_eq!(u32::decode("seven"), None);
        assert_eq!(bool::decode("true"), Some(true));
        assert_eq!(bool::decode("yes"), None);
        assert_eq!(SortOrder::decode("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::decode("sideways"), None);
    }

    #[test]
    fn test_json_codecs_round_trip() {
        let range = DateRange::new("2024-01-01", "2024-03-31");
        let encoded = range.encode();
        assert_eq!(DateRange::decode(&encoded), Some(range));

        let filters = vec![ColumnFilter::new("status", "active")];
        let encoded = filters.encode();
        assert_eq!(<Vec<ColumnFilter>>::decode(&encoded), Some(filters));
    }

    #[test]
    fn test_malformed_json_falls_back_to_default() {
        let key = date_range();
        assert_eq!(key.decode_or_default("not-json"), DateRange::default());

        let key = column_filters();
        assert_eq!(key.decode_or_default("[{"), Vec::new());
    }

    #[test]
    fn test_out_of_range_page_values_fall_back_to_default() {
        // Pages are 1-based; a hand-edited "?page=0" must not seed a zero.
        assert_eq!(page().decode_or_default("0"), 1);
        assert_eq!(page().decode_or_default("3"), 3);
        assert_eq!(page_size(25).decode_or_default("0"), 25);
        assert_eq!(page_size(25).decode_or_default("50"), 50);
    }

    #[test]
    fn test_is_default_uses_structural_equality() {
        let key = page();
        assert!(key.is_default(&1));
        assert!(!key.is_default(&2));

        let key = column_filters();
        assert!(key.is_default(&Vec::new()));
        assert!(!key.is_default(&vec![ColumnFilter::new("status", json!(["a", "b"]))]));
    }
}
