//! # Sync Error Types
//!
//! Every failure the inventory client can observe, grouped by how the client
//! reacts to it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Category      │ Variants                      │ Client reaction        │
//! │  ──────────────┼───────────────────────────────┼──────────────────────  │
//! │  Config        │ InvalidConfig, InvalidUrl,    │ refuse to construct    │
//! │                │ ConfigLoadFailed              │                        │
//! │  Transport     │ ConnectionFailed, Timeout,    │ backoff and reconnect  │
//! │                │ Disconnected, TlsError,       │                        │
//! │                │ WebSocketError                │                        │
//! │  Protocol      │ Protocol, SerializationFailed │ record, stay connected │
//! │  Command       │ CommandRejected               │ drop, record           │
//! │  Terminal      │ ExhaustedRetries              │ Failed, tell the user  │
//! │  Internal      │ ShuttingDown, ChannelError,   │ report to the caller   │
//! │                │ Internal                      │                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `Terminal` errors must reach the user; the rest are logged, recorded
//! as the client's last error, and absorbed.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::machine::ConnectionState;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// How the client reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Config,
    Transport,
    Protocol,
    Command,
    Terminal,
    Internal,
}

/// Inventory client error.
///
/// `Clone` so the last error can be handed to any number of readers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    /// Config file unreadable or not valid TOML.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Transport
    // =========================================================================
    /// Dial or socket I/O failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The feed closed the connection.
    #[error("Disconnected from inventory feed")]
    Disconnected,

    /// Dial did not complete within the connect timeout (seconds).
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    // =========================================================================
    // Protocol
    // =========================================================================
    /// A frame did not decode into an inventory update.
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    /// An outbound command did not encode.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Command
    // =========================================================================
    /// A command was issued while the connection was not usable.
    #[error("Command '{command}' rejected: connection is {state}")]
    CommandRejected {
        command: &'static str,
        state: ConnectionState,
    },

    // =========================================================================
    // Terminal
    // =========================================================================
    /// Reconnection gave up after the configured number of attempts.
    #[error("Lost connection to inventory feed after {attempts} attempts; resync required")]
    ExhaustedRetries { attempts: u32 },

    // =========================================================================
    // Internal
    // =========================================================================
    #[error("Inventory client is shutting down")]
    ShuttingDown,

    /// The driver task is gone or its queue is full.
    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::InvalidConfig(_)
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_) => ErrorCategory::Config,

            SyncError::ConnectionFailed(_)
            | SyncError::Disconnected
            | SyncError::Timeout(_)
            | SyncError::TlsError(_)
            | SyncError::WebSocketError(_) => ErrorCategory::Transport,

            SyncError::Protocol { .. } | SyncError::SerializationFailed(_) => {
                ErrorCategory::Protocol
            }

            SyncError::CommandRejected { .. } => ErrorCategory::Command,

            SyncError::ExhaustedRetries { .. } => ErrorCategory::Terminal,

            SyncError::ShuttingDown | SyncError::ChannelError(_) | SyncError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns true if the reconnect loop retries after this error.
    pub fn is_retryable(&self) -> bool {
        self.is_transport_error()
    }

    pub fn is_transport_error(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    pub fn is_protocol_error(&self) -> bool {
        self.category() == ErrorCategory::Protocol
    }

    pub fn is_config_error(&self) -> bool {
        self.category() == ErrorCategory::Config
    }

    /// Returns true if someone has to act (manual resync, restart).
    pub fn requires_user_action(&self) -> bool {
        self.category() == ErrorCategory::Terminal
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<tungstenite::Error> for SyncError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                SyncError::Disconnected
            }
            tungstenite::Error::Io(e) => SyncError::ConnectionFailed(e.to_string()),
            tungstenite::Error::Tls(e) => SyncError::TlsError(e.to_string()),
            tungstenite::Error::Url(e) => SyncError::InvalidUrl(e.to_string()),
            other => SyncError::WebSocketError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_retry() {
        assert!(SyncError::ConnectionFailed("refused".into()).is_retryable());
        assert!(SyncError::Disconnected.is_retryable());
        assert!(SyncError::Timeout(10).is_retryable());

        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::ExhaustedRetries { attempts: 5 }.is_retryable());
        assert!(!SyncError::Protocol { reason: "bad".into() }.is_retryable());
    }

    #[test]
    fn test_only_exhaustion_needs_the_user() {
        assert!(SyncError::ExhaustedRetries { attempts: 5 }.requires_user_action());
        assert!(!SyncError::Disconnected.requires_user_action());
        assert!(!SyncError::CommandRejected {
            command: "get_inventory",
            state: ConnectionState::Connecting,
        }
        .requires_user_action());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            SyncError::Protocol { reason: "x".into() }.category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            SyncError::InvalidUrl("x".into()).category(),
            ErrorCategory::Config
        );
        assert_eq!(SyncError::ShuttingDown.category(), ErrorCategory::Internal);
        assert!(SyncError::SerializationFailed("x".into()).is_protocol_error());
        assert!(SyncError::ConfigLoadFailed("x".into()).is_config_error());
    }

    #[test]
    fn test_tungstenite_conversion() {
        assert_eq!(
            SyncError::from(tungstenite::Error::ConnectionClosed),
            SyncError::Disconnected
        );
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(SyncError::from(tungstenite::Error::Io(io)).is_transport_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::CommandRejected {
            command: "get_inventory",
            state: ConnectionState::Backoff {
                attempt: 2,
                delay_ms: 2000,
            },
        };
        assert_eq!(
            err.to_string(),
            "Command 'get_inventory' rejected: connection is backoff (attempt 2, retry in 2000ms)"
        );
        assert!(SyncError::ExhaustedRetries { attempts: 5 }
            .to_string()
            .contains("5 attempts"));
    }
}
