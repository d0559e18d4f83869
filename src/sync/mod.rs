//! State synchronization: shareable addresses, per-key channels, and the
//! coordinator that batches every change made in a tick into one external
//! write.

pub mod address;
pub mod channel;
pub mod coordinator;
pub mod debounce;
pub mod deep_equal;
pub mod keys;
pub mod state;

pub use address::{Address, SharedAddress};
pub use channel::StateChannel;
pub use coordinator::UpdateCoordinator;
pub use debounce::SearchDebouncer;
pub use deep_equal::deep_equal;
pub use keys::{ColumnFilter, DateRange, SortOrder, StateKey, StateKind, StateValue};
pub use state::SyncedState;
