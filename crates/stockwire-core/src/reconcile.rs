//! # Reconciler
//!
//! Pure reduction from `(Replica, UpdateEvent)` to the next `Replica`.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Snapshot(items)    replica := dedupe_keep_last(items)                 │
//! │  Upsert(item)       same id present → replace at its position          │
//! │                     otherwise       → append                           │
//! │  BulkUpsert(items)  fold Upsert over items; untouched entries stay     │
//! │  Delete(id)         remove if present                                  │
//! │  Malformed          identity                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every rule preserves id uniqueness. The input replica is never modified:
//! the same `(replica, event)` always yields the same result, so any
//! sequence of events can be replayed from empty to rebuild a replica.

use crate::event::UpdateEvent;
use crate::replica::Replica;

/// Computes the replica that results from applying `event` to `replica`.
pub fn reconcile(replica: &Replica, event: &UpdateEvent) -> Replica {
    match event {
        UpdateEvent::Snapshot(items) => Replica::from_items(items.iter().cloned()),
        UpdateEvent::Upsert(item) => {
            let mut next = replica.clone();
            next.upsert(item.clone());
            next
        }
        UpdateEvent::BulkUpsert(items) => {
            let mut next = replica.clone();
            for item in items {
                next.upsert(item.clone());
            }
            next
        }
        UpdateEvent::Delete(id) => {
            let mut next = replica.clone();
            next.remove(*id);
            next
        }
        UpdateEvent::Malformed { .. } => replica.clone(),
    }
}

/// Rebuilds a replica by applying `events` in order, starting from empty.
pub fn replay<'a, I>(events: I) -> Replica
where
    I: IntoIterator<Item = &'a UpdateEvent>,
{
    events
        .into_iter()
        .fold(Replica::new(), |replica, event| reconcile(&replica, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemId, StockItem};
    use std::collections::HashSet;

    fn item(id: i64, stock: i64) -> StockItem {
        StockItem::new(id, format!("item-{id}")).with_stock(stock)
    }

    fn has_unique_ids(replica: &Replica) -> bool {
        let mut seen = HashSet::new();
        replica.iter().all(|item| seen.insert(item.id))
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let replica = Replica::from_items(vec![item(1, 5)]);
        let next = reconcile(&replica, &UpdateEvent::Upsert(item(1, 3)));
        assert_eq!(next.items(), &[item(1, 3)]);
    }

    #[test]
    fn test_upsert_appends_new_items() {
        let replica = Replica::from_items(vec![item(1, 5)]);
        let next = reconcile(&replica, &UpdateEvent::Upsert(item(2, 1)));
        assert_eq!(next.ids(), vec![ItemId::new(1), ItemId::new(2)]);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let replica = Replica::from_items(vec![item(1, 5)]);
        let next = reconcile(&replica, &UpdateEvent::Delete(ItemId::new(99)));
        assert_eq!(next, replica);
    }

    #[test]
    fn test_delete_removes_entry() {
        let replica = Replica::from_items(vec![item(1, 5), item(2, 6)]);
        let next = reconcile(&replica, &UpdateEvent::Delete(ItemId::new(1)));
        assert_eq!(next.items(), &[item(2, 6)]);
    }

    #[test]
    fn test_bulk_upsert_preserves_untouched_entries() {
        let replica = Replica::from_items(vec![item(1, 5), item(2, 5)]);
        let next = reconcile(&replica, &UpdateEvent::BulkUpsert(vec![item(2, 0)]));
        assert_eq!(next.items(), &[item(1, 5), item(2, 0)]);
    }

    #[test]
    fn test_bulk_upsert_applies_in_order() {
        let replica = Replica::new();
        let next = reconcile(
            &replica,
            &UpdateEvent::BulkUpsert(vec![item(1, 1), item(2, 2), item(1, 9)]),
        );
        // Later duplicate wins but keeps the first slot, unlike Snapshot
        assert_eq!(next.items(), &[item(1, 9), item(2, 2)]);
    }

    #[test]
    fn test_snapshot_dedupes_keeping_last() {
        let next = reconcile(
            &Replica::new(),
            &UpdateEvent::Snapshot(vec![item(1, 1), item(2, 2), item(1, 9)]),
        );
        assert_eq!(next.items(), &[item(2, 2), item(1, 9)]);
    }

    #[test]
    fn test_snapshot_ignores_history() {
        let snapshot = UpdateEvent::Snapshot(vec![item(3, 1), item(4, 2)]);
        let expected = reconcile(&Replica::new(), &snapshot);

        let histories = vec![
            Replica::new(),
            Replica::from_items(vec![item(3, 100)]),
            Replica::from_items(vec![item(9, 1), item(4, 0), item(7, 7)]),
        ];
        for prior in histories {
            assert_eq!(reconcile(&prior, &snapshot), expected);
        }
    }

    #[test]
    fn test_malformed_is_identity() {
        let replica = Replica::from_items(vec![item(1, 5)]);
        let next = reconcile(
            &replica,
            &UpdateEvent::Malformed {
                raw: "garbage".into(),
                reason: "not json".into(),
            },
        );
        assert_eq!(next, replica);
    }

    #[test]
    fn test_input_replica_is_untouched() {
        let replica = Replica::from_items(vec![item(1, 5)]);
        let before = replica.clone();
        let _ = reconcile(&replica, &UpdateEvent::Delete(ItemId::new(1)));
        let _ = reconcile(&replica, &UpdateEvent::Upsert(item(1, 0)));
        assert_eq!(replica, before);
    }

    #[test]
    fn test_uniqueness_over_mixed_sequence() {
        let events = vec![
            UpdateEvent::Upsert(item(1, 1)),
            UpdateEvent::BulkUpsert(vec![item(2, 1), item(1, 2), item(2, 3)]),
            UpdateEvent::Snapshot(vec![item(5, 1), item(5, 2), item(6, 1)]),
            UpdateEvent::Upsert(item(6, 4)),
            UpdateEvent::Delete(ItemId::new(5)),
            UpdateEvent::BulkUpsert(vec![item(5, 1), item(7, 1), item(7, 2)]),
            UpdateEvent::Upsert(item(5, 8)),
        ];

        let mut replica = Replica::new();
        for event in &events {
            replica = reconcile(&replica, event);
            assert!(has_unique_ids(&replica), "duplicate after {}", event.kind());
        }
        assert_eq!(replica.ids(), vec![ItemId::new(6), ItemId::new(5), ItemId::new(7)]);
        assert_eq!(replica.get(ItemId::new(5)).unwrap().stock, 8);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let events = vec![
            UpdateEvent::Snapshot(vec![item(1, 1), item(2, 2)]),
            UpdateEvent::Delete(ItemId::new(1)),
            UpdateEvent::Upsert(item(3, 3)),
        ];
        let first = replay(&events);
        let second = replay(&events);
        assert_eq!(first, second);
        assert_eq!(first.items(), &[item(2, 2), item(3, 3)]);
    }
}
