//! Data plumbing: fetch inputs and sources, selection, and the value
//! helpers shared by filtering and export.

pub mod memory;
pub mod selection;
pub mod source;
pub mod values;

pub use memory::{CachedMemoryQuery, MemorySource};
pub use selection::{
    BulkActionFn, IdentityFetchFn, IndexSelectionChange, ItemId, SelectionTracker,
};
pub use source::{
    DataSource, DataSourceAdapter, FetchFn, FetchFuture, FetchParams, FetchResult, ManagedQuery,
    PageInfo, QuerySnapshot,
};
