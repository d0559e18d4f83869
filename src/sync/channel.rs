//! Per-key reactive values bound to the shared address.

use std::rc::Rc;
use std::cell::RefCell;

use tracing::trace;

use crate::sync::coordinator::{PendingUpdate, UpdateCoordinator};
use crate::sync::keys::{StateKey, StateValue};

/// One synchronized value. Reads come from a local cache that updates
/// synchronously on write; the coordinator carries the change out to the
/// address at the next flush.
pub struct StateChannel<T: StateValue> {
    key: StateKey<T>,
    value: RefCell<T>,
    coordinator: Rc<UpdateCoordinator>,
}

impl<T: StateValue> StateChannel<T> {
    /// Bind a key to a coordinator, initializing from the pending buffer
    /// (read-your-writes within a tick), then the address, else the
    /// default.
    pub fn bind(key: StateKey<T>, coordinator: Rc<UpdateCoordinator>) -> Self {
        let value = match coordinator.read_raw(key.name) {
            Some(raw) => key.decode_or_default(&raw),
            None => key.default_value().clone(),
        };
        Self {
            key,
            value: RefCell::new(value),
            coordinator,
        }
    }

    pub fn name(&self) -> &'static str {
        self.key.name
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Write a new value. Deep-equal writes are dropped before they reach
    /// the pending buffer, so they cannot schedule a flush.
    pub fn set(&self, next: T) {
        if next.equals(&self.value.borrow()) {
            trace!(target: "sync", "{}: unchanged write dropped", self.key.name);
            return;
        }
        self.commit(next);
    }

    /// Write computed from the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.value.borrow());
        self.set(next);
    }

    fn commit(&self, next: T) {
        self.coordinator.stage(
            self.key.name,
            PendingUpdate {
                serialized: next.encode(),
                is_default: self.key.is_default(&next),
            },
        );
        *self.value.borrow_mut() = next;
    }
}
