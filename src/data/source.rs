//! Data sources: how a list view gets its rows.
//!
//! Two integration styles share one adapter. Callback sources hand the
//! engine an async fetch function and let it track loading and errors;
//! managed sources own their caching and expose a snapshot the engine
//! mirrors. Either way the engine refetches exactly when the fetch input
//! identity changes, never on unrelated ticks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::error::FetchError;
use crate::sync::keys::{ColumnFilter, SortOrder};
use crate::sync::state::SyncedState;

/// The complete input identity of one fetch. Two equal values mean the
/// same request; the adapter compares them structurally to decide whether
/// a refetch is due.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchParams {
    pub page: u32,
    pub limit: u32,
    pub search: String,
    pub from_date: String,
    pub to_date: String,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub column_filters: Vec<ColumnFilter>,
}

impl FetchParams {
    /// Snapshot the fetch-relevant slice of synchronized state. The sort
    /// pair is carried only while a sort field is active; presentation
    /// keys (visibility, order, sizing) never reach a fetch.
    pub fn from_state(state: &SyncedState) -> Self {
        let (sort_by, sort_order) = state.sort().unzip();
        let range = state.date_range();
        Self {
            page: state.page(),
            limit: state.page_size(),
            search: state.search(),
            from_date: range.from_date,
            to_date: range.to_date,
            sort_by,
            sort_order,
            column_filters: state.column_filters(),
        }
    }
}

/// Server-reported paging envelope accompanying a page of items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl PageInfo {
    pub fn for_total(page: u32, limit: u32, total_items: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            (total_items.div_ceil(limit as u64)) as u32
        };
        Self {
            page,
            limit,
            total_pages,
            total_items,
        }
    }
}

/// One fetched page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub items: Vec<Value>,
    pub pagination: PageInfo,
}

/// Lifecycle mirror of the active query. Previous data is kept through
/// reloads and failures so the list never flashes empty while paging.
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
    pub is_loading: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub data: Option<FetchResult>,
    pub error: Option<FetchError>,
}

impl QuerySnapshot {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn success(data: FetchResult) -> Self {
        Self {
            is_success: true,
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn failure(error: FetchError) -> Self {
        Self {
            is_error: true,
            error: Some(error),
            ..Self::default()
        }
    }

    fn begin_loading(&mut self) {
        self.is_loading = true;
        self.is_error = false;
        self.error = None;
    }

    fn resolve(&mut self, data: FetchResult) {
        self.is_loading = false;
        self.is_success = true;
        self.is_error = false;
        self.data = Some(data);
        self.error = None;
    }

    fn reject(&mut self, error: FetchError) {
        self.is_loading = false;
        self.is_error = true;
        self.error = Some(error);
    }

    pub fn items(&self) -> &[Value] {
        self.data.as_ref().map(|d| d.items.as_slice()).unwrap_or(&[])
    }

    pub fn page_info(&self) -> Option<PageInfo> {
        self.data.as_ref().map(|d| d.pagination)
    }
}

pub type FetchFuture = Pin<Box<dyn Future<Output = Result<FetchResult, FetchError>> + Send>>;
pub type FetchFn = Arc<dyn Fn(FetchParams) -> FetchFuture + Send + Sync>;

/// A query integration that owns its own caching and refresh policy. The
/// engine asks it for a receiver per input identity and mirrors whatever
/// snapshots arrive.
pub trait ManagedQuery {
    fn query(&mut self, params: &FetchParams) -> watch::Receiver<QuerySnapshot>;

    /// Drop cached results so the next `query` call refetches.
    fn invalidate(&mut self);
}

pub enum DataSource {
    Callback(FetchFn),
    Managed(Box<dyn ManagedQuery>),
}

impl DataSource {
    pub fn callback<F, Fut>(fetch: F) -> Self
    where
        F: Fn(FetchParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FetchResult, FetchError>> + Send + 'static,
    {
        Self::Callback(Arc::new(move |params| Box::pin(fetch(params))))
    }

    pub fn managed(query: impl ManagedQuery + 'static) -> Self {
        Self::Managed(Box::new(query))
    }

    /// Run one fetch to completion outside the adapter lifecycle, e.g. to
    /// gather every matching row for an export. Managed sources are polled
    /// through their receiver until the snapshot settles.
    pub async fn fetch_once(&mut self, params: FetchParams) -> Result<FetchResult, FetchError> {
        match self {
            Self::Callback(fetch) => (fetch)(params).await,
            Self::Managed(query) => {
                let mut rx = query.query(&params);
                loop {
                    let snapshot = rx.borrow_and_update().clone();
                    if snapshot.is_error {
                        return Err(snapshot
                            .error
                            .unwrap_or_else(|| FetchError::Network("query failed".to_string())));
                    }
                    if snapshot.is_success && !snapshot.is_loading {
                        return Ok(snapshot.data.unwrap_or_default());
                    }
                    rx.changed()
                        .await
                        .map_err(|_| FetchError::Network("query source closed".to_string()))?;
                }
            }
        }
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("DataSource::Callback"),
            Self::Managed(_) => f.write_str("DataSource::Managed"),
        }
    }
}

struct Completion {
    generation: u64,
    outcome: Result<FetchResult, FetchError>,
}

/// Drives one [`DataSource`] from fetch inputs.
///
/// Callback fetches are spawned on the runtime; completions come back
/// through an internal channel tagged with the generation that started
/// them, and any completion whose generation has been superseded is
/// discarded on arrival. There is no cancellation.
pub struct DataSourceAdapter {
    source: DataSource,
    runtime: Handle,
    last_params: Option<FetchParams>,
    generation: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    managed_rx: Option<watch::Receiver<QuerySnapshot>>,
    snapshot: QuerySnapshot,
}

impl DataSourceAdapter {
    pub fn new(source: DataSource, runtime: Handle) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            source,
            runtime,
            last_params: None,
            generation: 0,
            completions_tx,
            completions_rx,
            managed_rx: None,
            snapshot: QuerySnapshot::idle(),
        }
    }

    /// Refetch if and only if the input identity changed since the last
    /// call. Safe to call every tick.
    pub fn sync(&mut self, params: FetchParams) {
        if self.last_params.as_ref() == Some(&params) {
            return;
        }
        self.generation += 1;
        debug!(target: "data", "fetch inputs changed (gen {}): {:?}", self.generation, params);
        self.last_params = Some(params.clone());
        match &mut self.source {
            DataSource::Callback(fetch) => {
                self.snapshot.begin_loading();
                let future = (fetch)(params);
                let tx = self.completions_tx.clone();
                let generation = self.generation;
                self.runtime.spawn(async move {
                    let outcome = future.await;
                    let _ = tx.send(Completion {
                        generation,
                        outcome,
                    });
                });
            }
            DataSource::Managed(query) => {
                let mut rx = query.query(&params);
                self.snapshot = rx.borrow_and_update().clone();
                self.managed_rx = Some(rx);
            }
        }
    }

    /// Apply completed work. Called once per tick; returns whether the
    /// snapshot changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if completion.generation != self.generation {
                trace!(
                    target: "data",
                    "dropping superseded result (gen {} < {})",
                    completion.generation,
                    self.generation
                );
                continue;
            }
            match completion.outcome {
                Ok(data) => self.snapshot.resolve(data),
                Err(error) => self.snapshot.reject(error),
            }
            changed = true;
        }
        if let Some(rx) = &mut self.managed_rx {
            // has_changed errors once the integration drops its sender;
            // the last mirrored snapshot stays.
            if rx.has_changed().unwrap_or(false) {
                self.snapshot = rx.borrow_and_update().clone();
                changed = true;
            }
        }
        changed
    }

    /// One fetch outside the adapter lifecycle; see [`DataSource::fetch_once`].
    pub async fn fetch_once(&mut self, params: FetchParams) -> Result<FetchResult, FetchError> {
        self.source.fetch_once(params).await
    }

    /// Forget the remembered input identity so the next `sync` refetches
    /// even when inputs have not changed.
    pub fn invalidate(&mut self) {
        self.last_params = None;
        if let DataSource::Managed(query) = &mut self.source {
            query.invalidate();
        }
    }

    pub fn snapshot(&self) -> &QuerySnapshot {
        &self.snapshot
    }

    pub fn items(&self) -> &[Value] {
        self.snapshot.items()
    }

    pub fn last_params(&self) -> Option<&FetchParams> {
        self.last_params.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::address::SharedAddress;
    use crate::sync::coordinator::UpdateCoordinator;
    use serde_json::json;

    #[test]
    fn test_from_state_omits_sort_until_active() {
        let bus = SharedAddress::new();
        let state = SyncedState::bind(UpdateCoordinator::new(bus), 10);

        let params = FetchParams::from_state(&state);
        assert_eq!(params.sort_by, None);
        assert_eq!(params.sort_order, None);
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 10);

        state.toggle_sort("score");
        let params = FetchParams::from_state(&state);
        assert_eq!(params.sort_by.as_deref(), Some("score"));
        assert_eq!(params.sort_order, Some(SortOrder::Desc));
    }

    #[test]
    fn test_page_info_rounds_up() {
        assert_eq!(PageInfo::for_total(1, 10, 0).total_pages, 0);
        assert_eq!(PageInfo::for_total(1, 10, 10).total_pages, 1);
        assert_eq!(PageInfo::for_total(1, 10, 11).total_pages, 2);
    }

    #[test]
    fn test_snapshot_keeps_data_through_reload_and_failure() {
        let mut snapshot = QuerySnapshot::success(FetchResult {
            items: vec![json!({"id": 1})],
            pagination: PageInfo::for_total(1, 10, 1),
        });

        snapshot.begin_loading();
        assert!(snapshot.is_loading);
        assert_eq!(snapshot.items().len(), 1, "previous page kept while loading");

        snapshot.reject(FetchError::Network("down".to_string()));
        assert!(snapshot.is_error);
        assert_eq!(snapshot.items().len(), 1, "previous page kept on failure");
    }
}
