//! # stockwire-sync: Inventory Sync Client for Stockwire
//!
//! This crate keeps a local replica of the stock catalog in sync with the
//! server's push feed over a long-lived WebSocket, recovering from
//! connection loss with exponential backoff.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Inventory Client Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                ConnectionManager (public entry point)            │  │
//! │  │                                                                  │  │
//! │  │  Spawns one driver task per client                               │  │
//! │  │  Drives the ConnectionMachine (reconnect/backoff)                │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   Transport    │  │   Protocol     │  │   ReplicaStore         │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Connector seam │  │ frame → typed  │  │ Arc<Replica> swaps     │    │
//! │  │ tungstenite WS │  │ UpdateEvent    │  │ connection state       │    │
//! │  │ ping/close     │  │ get_inventory  │  │ subscribers            │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ CommandChannel │  │    Config      │  │     SyncError          │    │
//! │  │ (connected     │  │ (TOML + env)   │  │ (transport, protocol,  │    │
//! │  │  only, no      │  │                │  │  command, terminal)    │    │
//! │  │  queueing)     │  │                │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`manager`] - `ConnectionManager` and the driver task
//! - [`machine`] - Reconnect state machine and backoff policy
//! - [`protocol`] - Frame decoder and outbound commands
//! - [`store`] - Replica store and subscriptions
//! - [`command`] - Outbound command channel
//! - [`transport`] - Connector seam and WebSocket implementation
//! - [`config`] - Client configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockwire_sync::{ClientConfig, ConnectionManager};
//!
//! let config = ClientConfig::load(None)?;
//! let client = ConnectionManager::new(config)?;
//!
//! let _subscription = client.subscribe(|snapshot| {
//!     println!("{} items, {}", snapshot.replica.len(), snapshot.connection);
//! });
//! client.start()?;
//!
//! // ...
//! client.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod command;
pub mod config;
pub mod error;
pub mod machine;
pub mod manager;
pub mod protocol;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use command::CommandChannel;
pub use config::{ClientConfig, ServerSettings};
pub use error::{ErrorCategory, SyncError, SyncResult};
pub use machine::{ConnectionMachine, ConnectionState, ReconnectPolicy, Transition};
pub use manager::{ConnectionManager, InventoryEventEmitter, NoOpEmitter};
pub use protocol::{decode_frame, Command};
pub use store::{ReplicaStore, StoreSnapshot, Subscription};
pub use transport::{Connection, Connector, WsConnection, WsConnector};

pub use stockwire_core::{ItemId, Money, Replica, StockItem, UpdateEvent};
