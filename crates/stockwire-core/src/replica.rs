//! # Replica
//!
//! The client-local mirror of the server's inventory.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Replica Layout                                  │
//! │                                                                         │
//! │   items:  [ #4 Tee/S ][ #9 Mug ][ #2 Cap ]   display order, stable     │
//! │   index:  { 4 → 0, 9 → 1, 2 → 2 }            id → position             │
//! │                                                                         │
//! │   • No two entries share an id                                         │
//! │   • index always mirrors items exactly                                 │
//! │   • Mutation is crate-private: only the reconciler changes a replica   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Serialize, Serializer};
use std::collections::HashMap;

use crate::types::{ItemId, StockItem};

/// Ordered, id-unique collection of stock items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replica {
    items: Vec<StockItem>,
    index: HashMap<ItemId, usize>,
}

impl Replica {
    /// Creates an empty replica.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a replica from items, keeping only the last occurrence of each
    /// id. The result follows the order of those last occurrences.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = StockItem>,
    {
        let items: Vec<StockItem> = items.into_iter().collect();

        let mut last_seen: HashMap<ItemId, usize> = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            last_seen.insert(item.id, position);
        }

        let mut replica = Replica {
            items: Vec::with_capacity(last_seen.len()),
            index: HashMap::with_capacity(last_seen.len()),
        };
        for (position, item) in items.into_iter().enumerate() {
            if last_seen.get(&item.id) == Some(&position) {
                replica.index.insert(item.id, replica.items.len());
                replica.items.push(item);
            }
        }
        replica
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up an item by id.
    pub fn get(&self, id: ItemId) -> Option<&StockItem> {
        self.index.get(&id).map(|&position| &self.items[position])
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    /// Display position of an item.
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Items in display order.
    pub fn items(&self) -> &[StockItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StockItem> {
        self.items.iter()
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    /// Inserts or replaces an item. Replacement keeps the existing position.
    pub(crate) fn upsert(&mut self, item: StockItem) {
        match self.index.get(&item.id) {
            Some(&position) => self.items[position] = item,
            None => {
                self.index.insert(item.id, self.items.len());
                self.items.push(item);
            }
        }
    }

    /// Removes an item, shifting later items up by one.
    pub(crate) fn remove(&mut self, id: ItemId) -> Option<StockItem> {
        let position = self.index.remove(&id)?;
        let removed = self.items.remove(position);
        for item in &self.items[position..] {
            if let Some(slot) = self.index.get_mut(&item.id) {
                *slot -= 1;
            }
        }
        Some(removed)
    }
}

impl<'a> IntoIterator for &'a Replica {
    type Item = &'a StockItem;
    type IntoIter = std::slice::Iter<'a, StockItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Serializes as a plain JSON array of items.
impl Serialize for Replica {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}
