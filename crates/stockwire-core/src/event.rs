//! # Update Events
//!
//! Typed result of decoding one inbound frame.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Variant      │ Effect on the replica                                  │
//! │  ─────────────┼──────────────────────────────────────────────────────  │
//! │  Snapshot     │ authoritative full replacement                         │
//! │  Upsert       │ insert-or-replace one item                             │
//! │  BulkUpsert   │ Upsert each item, in order                             │
//! │  Delete       │ remove by id, no-op if absent                          │
//! │  Malformed    │ none (decode failure, carries the raw frame)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::types::{ItemId, StockItem};

/// One decoded inventory update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Snapshot(Vec<StockItem>),
    Upsert(StockItem),
    BulkUpsert(Vec<StockItem>),
    Delete(ItemId),
    Malformed { raw: String, reason: String },
}

impl UpdateEvent {
    /// Short variant name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateEvent::Snapshot(_) => "snapshot",
            UpdateEvent::Upsert(_) => "upsert",
            UpdateEvent::BulkUpsert(_) => "bulk_upsert",
            UpdateEvent::Delete(_) => "delete",
            UpdateEvent::Malformed { .. } => "malformed",
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, UpdateEvent::Malformed { .. })
    }

    /// Number of items carried by the event.
    pub fn item_count(&self) -> usize {
        match self {
            UpdateEvent::Snapshot(items) | UpdateEvent::BulkUpsert(items) => items.len(),
            UpdateEvent::Upsert(_) => 1,
            UpdateEvent::Delete(_) | UpdateEvent::Malformed { .. } => 0,
        }
    }
}
