//! # Stockwire Watch
//!
//! Runs one inventory client against the configured feed and logs what it
//! sees.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  client.toml / STOCKWIRE_* ──► ClientConfig ──► ConnectionManager      │
//! │                                                      │                  │
//! │                          subscribe ◄─────────────────┘                  │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                     info!(items, in_stock, connection)                  │
//! │                                                                         │
//! │  Ctrl-C ──► shutdown()                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use stockwire_sync::{
    ClientConfig, ConnectionManager, ConnectionState, InventoryEventEmitter, SyncError,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Logs client events; surfaces exhaustion at `error` level.
struct LogEmitter;

impl InventoryEventEmitter for LogEmitter {
    fn emit_status(&self, state: ConnectionState) {
        info!(connection = %state, "Feed status");
    }

    fn emit_error(&self, error: &SyncError, retryable: bool) {
        if retryable {
            warn!(error = %error, "Feed error");
        } else {
            error!(error = %error, "Feed unavailable; restart or resync required");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ClientConfig::load(config_path)?;

    let client = ConnectionManager::new(config)?.with_emitter(Arc::new(LogEmitter));
    info!(client_id = %client.client_id(), "Starting stockwire-watch");

    let _subscription = client.subscribe(|snapshot| {
        let in_stock = snapshot
            .replica
            .iter()
            .filter(|item| item.is_in_stock())
            .count();
        info!(
            items = snapshot.replica.len(),
            in_stock,
            connection = %snapshot.connection,
            "Inventory changed"
        );
    });

    client.start()?;

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received");

    client.shutdown().await?;
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=stockwire_sync=trace` - Trace the client only
/// - Default: INFO level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
