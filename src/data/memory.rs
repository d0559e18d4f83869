//! In-memory data source implementing the full server contract over a
//! `Vec` of items: search, date window, per-column filters, sorting and
//! paging. Backs the bundled demo views and the integration tests.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use crate::data::selection::ItemId;
use crate::data::source::{
    DataSource, FetchParams, FetchResult, ManagedQuery, PageInfo, QuerySnapshot,
};
use crate::data::values::{compare_values, resolve_path};
use crate::sync::deep_equal::deep_equal;
use crate::sync::keys::SortOrder;

#[derive(Debug)]
pub struct MemorySource {
    items: RwLock<Vec<Value>>,
    search_fields: Vec<String>,
    date_field: Option<String>,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: RwLock::new(items),
            search_fields: Vec::new(),
            date_field: None,
            latency: None,
        }
    }

    /// Restrict search to these fields. Without this, every top-level
    /// string field is searched.
    pub fn with_search_fields(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Field the date window filters on.
    pub fn with_date_field(mut self, field: &str) -> Self {
        self.date_field = Some(field.to_string());
        self
    }

    /// Simulated request latency, for exercising loading states.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().unwrap().is_empty()
    }

    /// Run one query synchronously.
    pub fn fetch(&self, params: &FetchParams) -> FetchResult {
        let items = self.items.read().unwrap();
        let mut matched: Vec<&Value> = items
            .iter()
            .filter(|item| {
                self.matches_search(item, &params.search)
                    && self.matches_date_window(item, params)
                    && matches_column_filters(item, params)
            })
            .collect();

        if let (Some(field), Some(order)) = (&params.sort_by, params.sort_order) {
            matched.sort_by(|a, b| {
                let ordering = compare_values(resolve_path(a, field), resolve_path(b, field));
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let total_items = matched.len() as u64;
        let limit = params.limit.max(1);
        let start = ((params.page.max(1) - 1) as usize).saturating_mul(limit as usize);
        let items: Vec<Value> = matched
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();

        FetchResult {
            items,
            pagination: PageInfo::for_total(params.page, limit, total_items),
        }
    }

    fn matches_search(&self, item: &Value, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        if self.search_fields.is_empty() {
            let Some(map) = item.as_object() else {
                return false;
            };
            map.values()
                .filter_map(Value::as_str)
                .any(|s| s.to_lowercase().contains(&needle))
        } else {
            self.search_fields.iter().any(|field| {
                resolve_path(item, field)
                    .and_then(Value::as_str)
                    .map(|s| s.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        }
    }

    fn matches_date_window(&self, item: &Value, params: &FetchParams) -> bool {
        if params.from_date.is_empty() && params.to_date.is_empty() {
            return true;
        }
        let Some(field) = &self.date_field else {
            return true;
        };
        let Some(raw) = resolve_path(item, field).and_then(Value::as_str) else {
            return false;
        };
        // Comparing the date prefix keeps both plain dates and RFC 3339
        // timestamps inside an inclusive [from, to] window.
        let day = raw.get(..10).unwrap_or(raw);
        if !params.from_date.is_empty() && day < params.from_date.as_str() {
            return false;
        }
        if !params.to_date.is_empty() && day > params.to_date.as_str() {
            return false;
        }
        true
    }

    /// Items whose identity under `id_field` is in `ids`, in stored order.
    pub fn fetch_by_ids(&self, id_field: &str, ids: &[ItemId]) -> Vec<Value> {
        let items = self.items.read().unwrap();
        items
            .iter()
            .filter(|item| {
                item.get(id_field)
                    .and_then(ItemId::from_value)
                    .map(|id| ids.contains(&id))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Remove items by identity. Returns how many were removed.
    pub fn remove_by_ids(&self, id_field: &str, ids: &[ItemId]) -> usize {
        let mut items = self.items.write().unwrap();
        let before = items.len();
        items.retain(|item| {
            item.get(id_field)
                .and_then(ItemId::from_value)
                .map(|id| !ids.contains(&id))
                .unwrap_or(true)
        });
        before - items.len()
    }

    /// Apply a mutation to the items with the given identities. Returns how
    /// many were touched.
    pub fn update_by_ids(
        &self,
        id_field: &str,
        ids: &[ItemId],
        mut apply: impl FnMut(&mut Value),
    ) -> usize {
        let mut items = self.items.write().unwrap();
        let mut touched = 0;
        for item in items.iter_mut() {
            let hit = item
                .get(id_field)
                .and_then(ItemId::from_value)
                .map(|id| ids.contains(&id))
                .unwrap_or(false);
            if hit {
                apply(item);
                touched += 1;
            }
        }
        touched
    }

    /// Wrap a shared instance into a callback-style source, resolving
    /// through the runtime with the configured latency. The caller keeps
    /// its `Arc` for mutations.
    pub fn source(shared: Arc<Self>) -> DataSource {
        DataSource::Callback(Arc::new(move |params| {
            let source = Arc::clone(&shared);
            Box::pin(async move {
                if let Some(latency) = source.latency {
                    tokio::time::sleep(latency).await;
                }
                Ok(source.fetch(&params))
            })
        }))
    }

    pub fn into_source(self) -> DataSource {
        Self::source(Arc::new(self))
    }
}

/// A column filter matches when the cell equals the filter value, or when
/// the filter value is a list and any element equals the cell.
fn matches_column_filters(item: &Value, params: &FetchParams) -> bool {
    params.column_filters.iter().all(|filter| {
        let Some(cell) = resolve_path(item, &filter.id) else {
            return false;
        };
        match &filter.value {
            Value::Array(choices) => choices.iter().any(|choice| deep_equal(choice, cell)),
            single => deep_equal(single, cell),
        }
    })
}

/// Managed-style wrapper around [`MemorySource`] with a small per-input
/// result cache, so revisiting a page serves instantly from cache the way
/// an external query layer would.
pub struct CachedMemoryQuery {
    source: MemorySource,
    cache: Vec<(FetchParams, FetchResult)>,
    // Receivers go inert once their sender drops, so the latest one is
    // kept alive here.
    last_tx: Option<watch::Sender<QuerySnapshot>>,
}

const CACHE_CAP: usize = 32;

impl CachedMemoryQuery {
    pub fn new(source: MemorySource) -> Self {
        Self {
            source,
            cache: Vec::new(),
            last_tx: None,
        }
    }

    fn lookup(&self, params: &FetchParams) -> Option<FetchResult> {
        self.cache
            .iter()
            .find(|(cached, _)| cached == params)
            .map(|(_, result)| result.clone())
    }
}

impl ManagedQuery for CachedMemoryQuery {
    fn query(&mut self, params: &FetchParams) -> watch::Receiver<QuerySnapshot> {
        let result = match self.lookup(params) {
            Some(hit) => hit,
            None => {
                let computed = self.source.fetch(params);
                if self.cache.len() >= CACHE_CAP {
                    self.cache.remove(0);
                }
                self.cache.push((params.clone(), computed.clone()));
                computed
            }
        };
        let (tx, rx) = watch::channel(QuerySnapshot::success(result));
        self.last_tx = Some(tx);
        rx
    }

    fn invalidate(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::keys::ColumnFilter;
    use serde_json::json;

    fn courses() -> MemorySource {
        MemorySource::new(vec![
            json!({"id": 1, "name": "Algebra", "status": "active", "score": 50, "created_at": "2024-01-10T08:00:00Z"}),
            json!({"id": 2, "name": "Biology", "status": "draft", "score": 90, "created_at": "2024-02-20T08:00:00Z"}),
            json!({"id": 3, "name": "Chemistry", "status": "active", "score": 70, "created_at": "2024-03-05T08:00:00Z"}),
        ])
        .with_date_field("created_at")
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let result = courses().fetch(&FetchParams {
            page: 1,
            limit: 10,
            search: "BIO".to_string(),
            ..FetchParams::default()
        });
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0]["name"], "Biology");
    }

    #[test]
    fn test_date_window_is_inclusive() {
        let result = courses().fetch(&FetchParams {
            page: 1,
            limit: 10,
            from_date: "2024-02-20".to_string(),
            to_date: "2024-03-05".to_string(),
            ..FetchParams::default()
        });
        assert_eq!(result.items.len(), 2);
    }

    #[test]
    fn test_column_filter_list_means_any_of() {
        let result = courses().fetch(&FetchParams {
            page: 1,
            limit: 10,
            column_filters: vec![ColumnFilter::new("status", json!(["draft", "archived"]))],
            ..FetchParams::default()
        });
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0]["name"], "Biology");
    }

    #[test]
    fn test_sort_and_paging_envelope() {
        let result = courses().fetch(&FetchParams {
            page: 1,
            limit: 2,
            sort_by: Some("score".to_string()),
            sort_order: Some(SortOrder::Desc),
            ..FetchParams::default()
        });
        assert_eq!(result.items[0]["score"], 90);
        assert_eq!(result.items[1]["score"], 70);
        assert_eq!(result.pagination.total_items, 3);
        assert_eq!(result.pagination.total_pages, 2);

        let past_end = courses().fetch(&FetchParams {
            page: 9,
            limit: 2,
            ..FetchParams::default()
        });
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.pagination.total_pages, 2);
    }

    #[test]
    fn test_remove_and_update_by_ids() {
        let source = courses();
        assert_eq!(source.remove_by_ids("id", &[ItemId::new("2")]), 1);
        assert_eq!(source.len(), 2);

        let touched = source.update_by_ids("id", &[ItemId::new("1")], |item| {
            item["status"] = json!("archived");
        });
        assert_eq!(touched, 1);
        let result = source.fetch(&FetchParams {
            page: 1,
            limit: 10,
            ..FetchParams::default()
        });
        assert_eq!(result.items[0]["status"], "archived");
    }

    #[test]
    fn test_cached_query_serves_repeat_inputs_from_cache() {
        let mut query = CachedMemoryQuery::new(courses());
        let params = FetchParams {
            page: 1,
            limit: 2,
            ..FetchParams::default()
        };

        let mut rx = query.query(&params);
        let first = rx.borrow_and_update().clone();
        assert!(first.is_success);
        assert_eq!(first.items().len(), 2);
        assert_eq!(query.cache.len(), 1);

        query.query(&params);
        assert_eq!(query.cache.len(), 1, "repeat input hits the cache");

        query.invalidate();
        assert!(query.cache.is_empty());
    }
}
