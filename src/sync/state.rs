//! The full bundle of synchronized list-view state.
//!
//! One `SyncedState` per list view, binding every registry key to one
//! coordinator. Setters encode the composite rules (page resets, sort
//! pairing); the coordinator turns however many writes a setter makes into
//! a single external write at the next flush.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::sync::channel::StateChannel;
use crate::sync::coordinator::UpdateCoordinator;
use crate::sync::keys::{self, ColumnFilter, DateRange, SortOrder};

pub struct SyncedState {
    coordinator: Rc<UpdateCoordinator>,
    page: StateChannel<u32>,
    page_size: StateChannel<u32>,
    search: StateChannel<String>,
    date_range: StateChannel<DateRange>,
    sort_by: StateChannel<String>,
    sort_order: StateChannel<SortOrder>,
    column_visibility: StateChannel<BTreeMap<String, bool>>,
    column_filters: StateChannel<Vec<ColumnFilter>>,
    column_order: StateChannel<Vec<String>>,
    column_sizing: StateChannel<BTreeMap<String, u16>>,
}

impl SyncedState {
    pub fn bind(coordinator: Rc<UpdateCoordinator>, default_page_size: u32) -> Self {
        Self {
            page: StateChannel::bind(keys::page(), Rc::clone(&coordinator)),
            page_size: StateChannel::bind(keys::page_size(default_page_size), Rc::clone(&coordinator)),
            search: StateChannel::bind(keys::search(), Rc::clone(&coordinator)),
            date_range: StateChannel::bind(keys::date_range(), Rc::clone(&coordinator)),
            sort_by: StateChannel::bind(keys::sort_by(), Rc::clone(&coordinator)),
            sort_order: StateChannel::bind(keys::sort_order(), Rc::clone(&coordinator)),
            column_visibility: StateChannel::bind(keys::column_visibility(), Rc::clone(&coordinator)),
            column_filters: StateChannel::bind(keys::column_filters(), Rc::clone(&coordinator)),
            column_order: StateChannel::bind(keys::column_order(), Rc::clone(&coordinator)),
            column_sizing: StateChannel::bind(keys::column_sizing(), Rc::clone(&coordinator)),
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Rc<UpdateCoordinator> {
        &self.coordinator
    }

    // ---- paging ----

    pub fn page(&self) -> u32 {
        self.page.get()
    }

    pub fn set_page(&self, page: u32) {
        self.page.set(page.max(1));
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    /// Change the page size and jump back to the first page. An unchanged
    /// size writes nothing, so it cannot clobber the current page either.
    pub fn set_page_size(&self, size: u32) {
        if size == self.page_size.get() {
            return;
        }
        self.page_size.set(size.max(1));
        self.page.set(1);
    }

    // ---- search ----

    pub fn search(&self) -> String {
        self.search.get()
    }

    /// A changed search term restarts paging from page 1; repeating the
    /// current term is a no-op.
    pub fn set_search(&self, term: impl Into<String>) {
        let term = term.into();
        if term == self.search.get() {
            return;
        }
        self.search.set(term);
        self.page.set(1);
    }

    // ---- date window ----

    pub fn date_range(&self) -> DateRange {
        self.date_range.get()
    }

    pub fn set_date_range(&self, range: DateRange) {
        self.date_range.set(range);
        self.page.set(1);
    }

    // ---- sorting ----

    /// The active sort, if any. `sort_order` is meaningless without a
    /// field, so an empty `sort_by` reads as unsorted regardless of what
    /// the order channel holds.
    pub fn sort(&self) -> Option<(String, SortOrder)> {
        let field = self.sort_by.get();
        if field.is_empty() {
            None
        } else {
            Some((field, self.sort_order.get()))
        }
    }

    pub fn set_sort(&self, field: impl Into<String>, order: SortOrder) {
        self.sort_by.set(field.into());
        self.sort_order.set(order);
    }

    /// Cycle a header click: new field sorts descending, a second click
    /// flips ascending, a third clears the sort.
    pub fn toggle_sort(&self, field: &str) {
        match self.sort() {
            Some((active, order)) if active == field => match order {
                SortOrder::Desc => self.sort_order.set(SortOrder::Asc),
                SortOrder::Asc => self.clear_sort(),
            },
            _ => self.set_sort(field, SortOrder::Desc),
        }
    }

    pub fn clear_sort(&self) {
        self.sort_by.set(String::new());
        self.sort_order.set(SortOrder::default());
    }

    // ---- column visibility ----

    /// Hidden columns only; a column absent from the map is visible.
    pub fn column_visibility(&self) -> BTreeMap<String, bool> {
        self.column_visibility.get()
    }

    pub fn is_column_visible(&self, id: &str) -> bool {
        self.column_visibility.get().get(id).copied().unwrap_or(true)
    }

    pub fn set_column_hidden(&self, id: &str, hidden: bool) {
        self.column_visibility.update(|map| {
            let mut next = map.clone();
            if hidden {
                next.insert(id.to_string(), false);
            } else {
                next.remove(id);
            }
            next
        });
    }

    // ---- column filters ----

    pub fn column_filters(&self) -> Vec<ColumnFilter> {
        self.column_filters.get()
    }

    pub fn column_filter(&self, id: &str) -> Option<Value> {
        self.column_filters
            .get()
            .into_iter()
            .find(|f| f.id == id)
            .map(|f| f.value)
    }

    /// Replace or remove one column's filter, keeping the others in their
    /// original order. Filter changes restart paging.
    pub fn set_column_filter(&self, id: &str, value: Option<Value>) {
        self.column_filters.update(|filters| {
            let mut next: Vec<ColumnFilter> =
                filters.iter().filter(|f| f.id != id).cloned().collect();
            if let Some(value) = value {
                next.push(ColumnFilter::new(id, value));
            }
            next
        });
        self.page.set(1);
    }

    pub fn clear_column_filters(&self) {
        self.column_filters.set(Vec::new());
        self.page.set(1);
    }

    // ---- column order and sizing ----

    pub fn column_order(&self) -> Vec<String> {
        self.column_order.get()
    }

    pub fn set_column_order(&self, order: Vec<String>) {
        self.column_order.set(order);
    }

    pub fn reset_column_order(&self) {
        self.column_order.set(Vec::new());
    }

    pub fn column_sizing(&self) -> BTreeMap<String, u16> {
        self.column_sizing.get()
    }

    pub fn column_width(&self, id: &str) -> Option<u16> {
        self.column_sizing.get().get(id).copied()
    }

    pub fn set_column_width(&self, id: &str, width: u16) {
        self.column_sizing.update(|map| {
            let mut next = map.clone();
            next.insert(id.to_string(), width);
            next
        });
    }

    pub fn reset_column_sizing(&self) {
        self.column_sizing.set(BTreeMap::new());
    }

    // ---- flush and sharing ----

    /// Drain this tick's staged writes into at most one external write.
    pub fn flush(&self) -> bool {
        self.coordinator.flush()
    }

    /// The shareable link for the current (flushed) state.
    pub fn share_link(&self) -> String {
        self.coordinator.bus().render()
    }
}
