//! Batches state-channel writes into single external writes.
//!
//! Every write issued within one event-loop tick lands in the pending
//! buffer; the orchestrator drains the buffer exactly once per tick via
//! [`UpdateCoordinator::flush`]. One coordinator exists per orchestrator
//! tree and is shared (`Rc`) with each of its channels; there is no
//! process-wide state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::sync::address::SharedAddress;
use crate::sync::keys;

/// A staged channel write, alive only until the next flush. `is_default`
/// drives pruning: defaulted keys leave the address instead of being
/// written out.
pub(crate) struct PendingUpdate {
    pub serialized: String,
    pub is_default: bool,
}

pub struct UpdateCoordinator {
    bus: SharedAddress,
    pending: RefCell<Vec<(&'static str, PendingUpdate)>>,
    flush_scheduled: Cell<bool>,
}

impl UpdateCoordinator {
    pub fn new(bus: SharedAddress) -> Rc<Self> {
        Rc::new(Self {
            bus,
            pending: RefCell::new(Vec::new()),
            flush_scheduled: Cell::new(false),
        })
    }

    pub fn bus(&self) -> &SharedAddress {
        &self.bus
    }

    /// Stage one write. A second write to the same key within the tick
    /// replaces the first; only the last value reaches the address.
    pub(crate) fn stage(&self, name: &'static str, update: PendingUpdate) {
        let mut pending = self.pending.borrow_mut();
        if let Some(slot) = pending.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = update;
        } else {
            pending.push((name, update));
        }
        self.flush_scheduled.set(true);
    }

    /// Read-your-writes lookup: the pending buffer shadows the address
    /// until the flush lands.
    pub(crate) fn read_raw(&self, name: &str) -> Option<String> {
        if let Some((_, update)) = self.pending.borrow().iter().find(|(n, _)| *n == name) {
            return Some(update.serialized.clone());
        }
        self.bus.current().get(name).map(str::to_string)
    }

    pub fn flush_scheduled(&self) -> bool {
        self.flush_scheduled.get()
    }

    /// Drain the pending buffer into exactly one external write.
    ///
    /// Staged changes apply in registry order, defaulted keys are pruned,
    /// and the sort pair is reconciled: `sort_order` is materialized
    /// whenever `sort_by` ends up present, and dropped whenever it does
    /// not. Returns whether an external write happened.
    pub fn flush(&self) -> bool {
        if !self.flush_scheduled.get() {
            return false;
        }
        self.flush_scheduled.set(false);

        let mut staged: Vec<(&'static str, PendingUpdate)> =
            self.pending.borrow_mut().drain(..).collect();
        staged.sort_by_key(|(name, _)| registry_rank(name));

        let mut next = self.bus.current();
        for (name, update) in staged {
            if update.is_default {
                next.remove(name);
            } else {
                next.set(name, update.serialized);
            }
        }

        // Sort keys travel as a pair. An absent sort_order always means the
        // owning channel holds the default, so materializing the default
        // encoding is the value the channel would have written.
        if next.contains(keys::SORT_BY) {
            if !next.contains(keys::SORT_ORDER) {
                next.set(keys::SORT_ORDER, keys::sort_order().default_encoded());
            }
        } else {
            next.remove(keys::SORT_ORDER);
        }

        debug!(target: "sync", "flush -> {}", next.render());
        self.bus.replace(next);
        true
    }
}

fn registry_rank(name: &str) -> usize {
    keys::REGISTRY
        .iter()
        .position(|known| *known == name)
        .unwrap_or(keys::REGISTRY.len())
}
