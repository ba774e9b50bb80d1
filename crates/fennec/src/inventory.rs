//! The client's item inventory.

use std::collections::HashMap;

use fennec_protocol::InventoryEntry;

/// Item quantities, reconciled from snapshots and deltas.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    items: HashMap<u16, u8>,
}

impl Inventory {
    /// Replaces the whole inventory from a snapshot.
    pub fn replace(&mut self, entries: &[InventoryEntry]) {
        self.items.clear();
        for entry in entries {
            self.items.insert(entry.item_id, entry.quantity);
        }
    }

    /// Sets an item's absolute quantity, returning the previous quantity
    /// if the item was already known.
    pub fn set(&mut self, item_id: u16, quantity: u8) -> Option<u8> {
        self.items.insert(item_id, quantity)
    }

    /// Adds to an item's quantity, saturating at the wire maximum.
    pub fn add(&mut self, item_id: u16, quantity: u8) {
        let slot = self.items.entry(item_id).or_insert(0);
        *slot = slot.saturating_add(quantity);
    }

    /// Quantity held of an item; zero if unknown.
    pub fn quantity(&self, item_id: u16) -> u8 {
        self.items.get(&item_id).copied().unwrap_or(0)
    }

    /// Number of distinct items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the inventory holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
