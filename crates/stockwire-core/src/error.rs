//! # Error Types
//!
//! Domain-specific error types for stockwire-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockwire-core errors (this file)                                     │
//! │  └── CoreError        - Value parsing failures (price, item id)        │
//! │                                                                         │
//! │  stockwire-sync errors (separate crate)                                │
//! │  └── SyncError        - Transport, protocol, command, retry failures   │
//! │                                                                         │
//! │  Flow: CoreError → serde error → Malformed frame → SyncError::Protocol │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in the reconciler can fail: errors only arise while turning raw
//! wire values into typed ones.

use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A price could not be parsed into integer cents.
    ///
    /// ## When This Occurs
    /// - Non-numeric string (`"abc"`)
    /// - More than two fractional digits (`"1.999"`)
    /// - Value outside the representable range
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// An item identifier was not an integer.
    #[error("Invalid item id: {0}")]
    InvalidItemId(String),
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidPrice("1.999".into());
        assert_eq!(err.to_string(), "Invalid price: 1.999");

        let err = CoreError::InvalidItemId("abc".into());
        assert!(err.to_string().contains("abc"));
    }
}
