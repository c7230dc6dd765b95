//! # stockwire-core: Pure Inventory Logic for Stockwire
//!
//! This crate holds the inventory domain as pure values and functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockwire Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               UI / business logic (subscribers)                 │   │
//! │  └─────────────────────────────▲───────────────────────────────────┘   │
//! │                                │ Arc<Replica> snapshots                 │
//! │  ┌─────────────────────────────┴───────────────────────────────────┐   │
//! │  │   stockwire-sync: decoder, store, command channel, connection   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ UpdateEvent                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockwire-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  replica  │  │ reconcile │  │   │
//! │  │   │ StockItem │  │   Money   │  │  Replica  │  │ reconcile │  │   │
//! │  │   │  ItemId   │  │  (cents)  │  │ (unique)  │  │  replay   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO ASYNC • NO NETWORK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `StockItem` and `ItemId`
//! - [`money`] - Integer-cent prices
//! - [`replica`] - Ordered, id-unique item collection
//! - [`event`] - `UpdateEvent` variants
//! - [`reconcile`] - The pure reducer
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockwire_core::{reconcile, Replica, StockItem, UpdateEvent};
//!
//! let replica = Replica::new();
//! let replica = reconcile(&replica, &UpdateEvent::Snapshot(vec![
//!     StockItem::new(1, "Tee").with_stock(5),
//! ]));
//! let replica = reconcile(&replica, &UpdateEvent::Upsert(
//!     StockItem::new(1, "Tee").with_stock(3),
//! ));
//!
//! assert_eq!(replica.len(), 1);
//! assert_eq!(replica.items()[0].stock, 3);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod event;
pub mod money;
pub mod reconcile;
pub mod replica;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use event::UpdateEvent;
pub use money::Money;
pub use reconcile::{reconcile, replay};
pub use replica::Replica;
pub use types::{ItemId, StockItem};
