use std::collections::HashMap;

use crate::ids::{EngineAddr, OrderId};
use crate::order::Order;

/// The authoritative record of a live order: how much of it remains, and
/// which engine currently holds it (may differ from `order_record`'s
/// `engine_origin_addr` once the order has been routed).
#[derive(Debug, Clone)]
pub struct ActiveOrderEntry {
    pub remaining_quantity: u64,
    pub owning_engine_addr: EngineAddr,
    pub order_record: Order,
}

/// Per-ME mapping from order id to its current owning engine and remaining
/// quantity. Entries are created when an ME first sees an order (whether
/// submitted locally or routed out) and removed when the order is fully
/// filled or cancelled.
///
/// Both the order book (on fill) and the cancellation coordinator (on
/// cancel) mutate this table; it is never reachable from more than one
/// place at a time because the owning [`MatchEngine`](../../matching_engine)
/// actor task is the only caller of either.
#[derive(Debug, Default)]
pub struct ActiveOrderTable {
    entries: HashMap<OrderId, ActiveOrderEntry>,
}

impl ActiveOrderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order_id: OrderId, entry: ActiveOrderEntry) {
        self.entries.insert(order_id, entry);
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&ActiveOrderEntry> {
        self.entries.get(order_id)
    }

    pub fn get_mut(&mut self, order_id: &OrderId) -> Option<&mut ActiveOrderEntry> {
        self.entries.get_mut(order_id)
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.entries.contains_key(order_id)
    }

    pub fn remove(&mut self, order_id: &OrderId) -> Option<ActiveOrderEntry> {
        self.entries.remove(order_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Updates an order's remaining quantity after a fill, deleting the
    /// entry once it reaches zero. Missing keys are reported back to the
    /// caller (who logs and ignores them, per the spec — a fill can name an
    /// order already fully resolved or cancelled by the time it applies).
    pub fn apply_fill_remaining(&mut self, order_id: &OrderId, remaining_quantity: u64) -> bool {
        match self.entries.get_mut(order_id) {
            Some(entry) => {
                entry.remaining_quantity = remaining_quantity;
                if entry.remaining_quantity == 0 {
                    self.entries.remove(order_id);
                }
                true
            }
            None => false,
        }
    }

    /// Snapshot of all currently-live order ids. Use this — never a live
    /// iterator — before removing entries in bulk; mutating a map while
    /// iterating it is the `cancel_all_orders` hazard named in the spec's
    /// design notes.
    pub fn snapshot_ids(&self) -> Vec<OrderId> {
        self.entries.keys().cloned().collect()
    }
}
