//! # Replica Store
//!
//! Holds the current replica, the connection state and the last recorded
//! error, and notifies subscribers whenever the replica or the connection
//! state changes.
//!
//! ## Read / Write Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ReplicaStore                                    │
//! │                                                                         │
//! │  WRITER (one)                         READERS (many)                   │
//! │  ────────────                         ──────────────                   │
//! │  connection driver task               UI / business logic              │
//! │    apply(event)                         snapshot()     → Arc<Replica>  │
//! │    set_connection_state(state)          connection_state()             │
//! │    record_error(err)                    last_error()                   │
//! │                                         subscribe(listener)            │
//! │                                                                         │
//! │  The replica is swapped, never edited: readers holding an             │
//! │  Arc<Replica> keep a consistent view for as long as they like.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Listeners run on the writer's task after the locks are released, so a
//! listener may call back into the store.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::debug;

use stockwire_core::{reconcile, Replica, UpdateEvent};

use crate::error::SyncError;
use crate::machine::ConnectionState;

// =============================================================================
// Snapshot
// =============================================================================

/// What subscribers receive on every change.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Current replica (immutable).
    pub replica: Arc<Replica>,

    /// Current connection state.
    pub connection: ConnectionState,

    /// When the replica last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

type Listener = Arc<dyn Fn(&StoreSnapshot) + Send + Sync>;

#[derive(Debug, Default)]
struct StoreState {
    replica: Arc<Replica>,
    connection: ConnectionState,
    last_error: Option<SyncError>,
    updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Replica Store
// =============================================================================

/// Shared home of the replica and connection status.
#[derive(Default)]
pub struct ReplicaStore {
    state: RwLock<StoreState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl ReplicaStore {
    /// Creates an empty store in `Disconnected`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current replica.
    pub fn snapshot(&self) -> Arc<Replica> {
        self.read().replica.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.read().connection
    }

    /// Most recently recorded error, if any.
    pub fn last_error(&self) -> Option<SyncError> {
        self.read().last_error.clone()
    }

    /// Everything a subscriber would receive, right now.
    pub fn current(&self) -> StoreSnapshot {
        let state = self.read();
        StoreSnapshot {
            replica: state.replica.clone(),
            connection: state.connection,
            updated_at: state.updated_at,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Reconciles `event` into the replica. Returns true if it changed.
    pub fn apply(&self, event: &UpdateEvent) -> bool {
        let changed = {
            let mut state = self.write();
            let next = reconcile(&state.replica, event);
            if next == *state.replica {
                false
            } else {
                state.replica = Arc::new(next);
                state.updated_at = Some(Utc::now());
                true
            }
        };

        if changed {
            self.notify();
        } else {
            debug!(kind = event.kind(), "Update left replica unchanged");
        }
        changed
    }

    /// Sets the connection state. Returns true if it changed.
    pub fn set_connection_state(&self, connection: ConnectionState) -> bool {
        let changed = {
            let mut state = self.write();
            let changed = state.connection != connection;
            state.connection = connection;
            changed
        };

        if changed {
            self.notify();
        }
        changed
    }

    /// Records `error` as the last error. Subscribers are not notified.
    pub fn record_error(&self, error: SyncError) {
        self.write().last_error = Some(error);
    }

    /// Drops the replica and returns to `Disconnected`.
    pub fn reset(&self) {
        let changed = {
            let mut state = self.write();
            let changed =
                !state.replica.is_empty() || state.connection != ConnectionState::Disconnected;
            state.replica = Arc::new(Replica::new());
            state.connection = ConnectionState::Disconnected;
            state.updated_at = None;
            changed
        };

        if changed {
            self.notify();
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Registers `listener` for every subsequent change.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&StoreSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        Subscription {
            id,
            store: Arc::downgrade(self),
        }
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener_id, _)| *listener_id != id);
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        if listeners.is_empty() {
            return;
        }

        let snapshot = self.current();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    store: Weak<ReplicaStore>,
}

impl Subscription {
    /// Stops delivery to the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockwire_core::{ItemId, StockItem};

    fn recorder(store: &Arc<ReplicaStore>) -> (Subscription, Arc<Mutex<Vec<StoreSnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = store.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.clone());
        });
        (subscription, seen)
    }

    #[test]
    fn test_new_store_is_empty_and_disconnected() {
        let store = ReplicaStore::new();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.connection_state(), ConnectionState::Disconnected);
        assert!(store.last_error().is_none());
        assert!(store.current().updated_at.is_none());
    }

    #[test]
    fn test_apply_swaps_replica_and_notifies() {
        let store = ReplicaStore::new();
        let (_subscription, seen) = recorder(&store);

        let before = store.snapshot();
        assert!(store.apply(&UpdateEvent::Upsert(StockItem::new(1, "Tee"))));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].replica.len(), 1);
        // Earlier snapshots are untouched
        assert!(before.is_empty());
        assert!(store.current().updated_at.is_some());
    }

    #[test]
    fn test_noop_events_do_not_notify() {
        let store = ReplicaStore::new();
        store.apply(&UpdateEvent::Upsert(StockItem::new(1, "Tee")));
        let (_subscription, seen) = recorder(&store);

        assert!(!store.apply(&UpdateEvent::Delete(ItemId::new(99))));
        assert!(!store.apply(&UpdateEvent::Upsert(StockItem::new(1, "Tee"))));
        assert!(!store.apply(&UpdateEvent::Malformed {
            raw: "x".into(),
            reason: "y".into(),
        }));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_connection_changes_notify_once() {
        let store = ReplicaStore::new();
        let (_subscription, seen) = recorder(&store);

        assert!(store.set_connection_state(ConnectionState::Connecting));
        assert!(!store.set_connection_state(ConnectionState::Connecting));
        assert!(store.set_connection_state(ConnectionState::Connected));

        let states: Vec<_> = seen.lock().unwrap().iter().map(|s| s.connection).collect();
        assert_eq!(
            states,
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[test]
    fn test_record_error_is_silent() {
        let store = ReplicaStore::new();
        let (_subscription, seen) = recorder(&store);

        store.record_error(SyncError::Disconnected);
        store.record_error(SyncError::Protocol {
            reason: "bad frame".into(),
        });

        assert!(seen.lock().unwrap().is_empty());
        assert!(store.last_error().unwrap().is_protocol_error());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let store = ReplicaStore::new();
        let (subscription, seen) = recorder(&store);
        assert_eq!(store.subscriber_count(), 1);

        subscription.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);

        store.set_connection_state(ConnectionState::Connecting);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listener_may_read_the_store() {
        let store = ReplicaStore::new();
        let reader = Arc::downgrade(&store);
        let observed = Arc::new(Mutex::new(None));
        let sink = observed.clone();
        let _subscription = store.subscribe(move |_| {
            if let Some(store) = reader.upgrade() {
                *sink.lock().unwrap() = Some(store.connection_state());
            }
        });

        store.set_connection_state(ConnectionState::Connected);
        assert_eq!(*observed.lock().unwrap(), Some(ConnectionState::Connected));
    }

    #[test]
    fn test_reset_clears_replica() {
        let store = ReplicaStore::new();
        store.apply(&UpdateEvent::Snapshot(vec![StockItem::new(1, "a")]));
        store.set_connection_state(ConnectionState::Connected);
        let (_subscription, seen) = recorder(&store);

        store.reset();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.connection_state(), ConnectionState::Disconnected);
        assert_eq!(seen.lock().unwrap().len(), 1);

        // Second reset has nothing to change
        store.reset();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
