//! Identity-keyed row selection.
//!
//! Selection is stored as a set of item identities, never row indexes, so
//! it survives server-side paging: pick rows on page 1, walk to page 5 and
//! back, and the same rows are still picked. Index-shaped selection
//! changes coming from the rendering surface are translated against the
//! currently loaded page.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::FetchError;

/// Canonical form of an item identity. Numeric identities normalize the
/// same way regardless of how the JSON spelled them, so `1` and `1.0`
/// name the same item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(String);

impl ItemId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Some(Self(u.to_string()))
                } else {
                    let f = n.as_f64()?;
                    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        Some(Self((f as i64).to_string()))
                    } else {
                        Some(Self(f.to_string()))
                    }
                }
            }
            _ => None,
        }
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type IdentityFetchFuture = Pin<Box<dyn std::future::Future<Output = Result<Vec<Value>, FetchError>> + Send>>;
pub type IdentityFetchFn = Arc<dyn Fn(Vec<ItemId>) -> IdentityFetchFuture + Send + Sync>;

pub type BulkActionFuture = Pin<Box<dyn std::future::Future<Output = Result<(), FetchError>> + Send>>;
pub type BulkActionFn = Arc<dyn Fn(Vec<ItemId>) -> BulkActionFuture + Send + Sync>;

/// An index-shaped selection change from the rendering surface: either a
/// full replacement map or a function of the previous map. Indexes map
/// into the currently loaded page.
pub enum IndexSelectionChange {
    Replace(BTreeMap<usize, bool>),
    With(Box<dyn FnOnce(&BTreeMap<usize, bool>) -> BTreeMap<usize, bool>>),
}

pub struct SelectionTracker {
    id_field: String,
    selected: BTreeSet<ItemId>,
}

impl SelectionTracker {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            selected: BTreeSet::new(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn identity_of(&self, item: &Value) -> Option<ItemId> {
        ItemId::from_value(item.get(&self.id_field)?)
    }

    pub fn is_selected(&self, id: &ItemId) -> bool {
        self.selected.contains(id)
    }

    pub fn is_selected_item(&self, item: &Value) -> bool {
        self.identity_of(item)
            .map(|id| self.selected.contains(&id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.selected.iter()
    }

    pub fn deselect(&mut self, id: &ItemId) {
        self.selected.remove(id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Flip one row. Rows without usable identities are ignored.
    pub fn toggle_item(&mut self, item: &Value) {
        let Some(id) = self.identity_of(item) else {
            warn!(target: "selection", "item without '{}' identity ignored", self.id_field);
            return;
        };
        if self.selected.contains(&id) {
            self.deselect(&id);
        } else {
            self.selected.insert(id);
        }
    }

    pub fn select_all(&mut self, page_items: &[Value]) {
        for item in page_items {
            if let Some(id) = self.identity_of(item) {
                self.selected.insert(id);
            }
        }
    }

    /// Project the identity set onto the loaded page's index space. Only
    /// selected indexes appear, all mapped to `true`.
    pub fn to_index_selection(&self, page_items: &[Value]) -> BTreeMap<usize, bool> {
        page_items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.is_selected_item(item))
            .map(|(index, _)| (index, true))
            .collect()
    }

    /// Apply an index-shaped change against the loaded page. Every loaded
    /// row is reconciled: present-and-true selects it, anything else
    /// deselects it. Indexes beyond the page are ignored; identities not
    /// on this page are untouched either way.
    pub fn apply_index_selection_change(
        &mut self,
        change: IndexSelectionChange,
        page_items: &[Value],
    ) {
        let previous = self.to_index_selection(page_items);
        let next = match change {
            IndexSelectionChange::Replace(map) => map,
            IndexSelectionChange::With(update) => update(&previous),
        };
        for (index, item) in page_items.iter().enumerate() {
            let Some(id) = self.identity_of(item) else {
                continue;
            };
            if next.get(&index).copied().unwrap_or(false) {
                self.selected.insert(id);
            } else {
                self.deselect(&id);
            }
        }
    }

    /// Resolve the selected identities to full items. Identities loaded on
    /// the current page resolve locally; the rest go to the bulk identity
    /// fetch when one is wired, and are otherwise dropped from the result.
    pub async fn resolve_selected_items(
        &self,
        page_items: &[Value],
        fetch_by_ids: Option<&IdentityFetchFn>,
    ) -> Result<Vec<Value>, FetchError> {
        let mut resolved = Vec::with_capacity(self.selected.len());
        let mut missing = Vec::new();
        for id in &self.selected {
            match page_items.iter().find(|item| {
                self.identity_of(item).as_ref() == Some(id)
            }) {
                Some(item) => resolved.push(item.clone()),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            match fetch_by_ids {
                Some(fetch) => {
                    let fetched = (fetch)(missing).await?;
                    resolved.extend(fetched);
                }
                None => {
                    warn!(
                        target: "selection",
                        "{} selected item(s) not on this page and no identity fetch wired",
                        missing.len()
                    );
                }
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_one() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Algebra"}),
            json!({"id": 2, "name": "Biology"}),
            json!({"id": 3, "name": "Chemistry"}),
        ]
    }

    fn page_two() -> Vec<Value> {
        vec![
            json!({"id": 4, "name": "Drama"}),
            json!({"id": 5, "name": "Economics"}),
        ]
    }

    #[test]
    fn test_selection_survives_paging() {
        let mut tracker = SelectionTracker::new("id");
        tracker.apply_index_selection_change(
            IndexSelectionChange::Replace(BTreeMap::from([(0, true), (2, true)])),
            &page_one(),
        );
        assert_eq!(tracker.len(), 2);

        // Page 2 shows nothing selected and selecting there adds to the set.
        assert!(tracker.to_index_selection(&page_two()).is_empty());
        tracker.apply_index_selection_change(
            IndexSelectionChange::Replace(BTreeMap::from([(1, true)])),
            &page_two(),
        );
        assert_eq!(tracker.len(), 3);

        // Back on page 1 the original rows are still selected.
        let on_page = tracker.to_index_selection(&page_one());
        assert_eq!(on_page, BTreeMap::from([(0, true), (2, true)]));
    }

    #[test]
    fn test_updater_change_sees_previous_map() {
        let mut tracker = SelectionTracker::new("id");
        tracker.toggle_item(&page_one()[1]);

        tracker.apply_index_selection_change(
            IndexSelectionChange::With(Box::new(|previous| {
                let mut next = previous.clone();
                next.insert(0, true);
                next
            })),
            &page_one(),
        );
        let on_page = tracker.to_index_selection(&page_one());
        assert_eq!(on_page, BTreeMap::from([(0, true), (1, true)]));
    }

    #[test]
    fn test_out_of_range_indexes_are_ignored() {
        let mut tracker = SelectionTracker::new("id");
        tracker.apply_index_selection_change(
            IndexSelectionChange::Replace(BTreeMap::from([(0, true), (99, true)])),
            &page_one(),
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_deselect_removes_only_that_identity() {
        let mut tracker = SelectionTracker::new("id");
        tracker.toggle_item(&page_one()[0]);
        tracker.toggle_item(&page_one()[1]);
        assert_eq!(tracker.len(), 2);

        let id = tracker.identity_of(&page_one()[1]).unwrap();
        tracker.deselect(&id);
        assert!(!tracker.is_selected(&id));
        assert!(tracker.is_selected_item(&page_one()[0]), "the other stays");

        // Deselecting an identity that is not in the set is a no-op.
        tracker.deselect(&id);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_numeric_identity_normalization() {
        let mut tracker = SelectionTracker::new("id");
        tracker.toggle_item(&json!({"id": 7}));
        assert!(tracker.is_selected_item(&json!({"id": 7.0})));
    }

    #[test]
    fn test_resolve_falls_back_to_identity_fetch() {
        let mut tracker = SelectionTracker::new("id");
        tracker.toggle_item(&page_one()[0]);
        tracker.toggle_item(&page_two()[0]);

        let fetch: IdentityFetchFn = Arc::new(|ids| {
            Box::pin(async move {
                Ok(ids
                    .iter()
                    .map(|id| json!({"id": id.as_str().parse::<i64>().unwrap(), "name": "fetched"}))
                    .collect())
            })
        });

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let resolved = runtime
            .block_on(tracker.resolve_selected_items(&page_one(), Some(&fetch)))
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0]["name"], "Algebra");
        assert_eq!(resolved[1]["name"], "fetched");

        let partial = runtime
            .block_on(tracker.resolve_selected_items(&page_one(), None))
            .unwrap();
        assert_eq!(partial.len(), 1, "off-page item dropped without a fetch");
    }
}
