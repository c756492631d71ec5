//! Error types for the wallet synchronization engine
//!
//! This module defines the error taxonomy used across the crate:
//! - `WalletError`: the top-level error type surfaced through `WalletResult`
//! - `KeychainError`: address derivation and usage-tracking failures
//! - `SyncError`: synchronizer state-machine failures
//!
//! All asynchronous operations propagate failures through `WalletResult`
//! rather than panicking across await points. Synchronous helpers (narrowing
//! casts, single-row assertions) fail fast with `InvalidArgument`.

use thiserror::Error;

/// Result type alias used throughout the crate
pub type WalletResult<T> = Result<T, WalletError>;

/// Top-level error type for wallet synchronization operations
#[derive(Debug, Error)]
pub enum WalletError {
    /// Explorer/network I/O failure. Transient: the in-progress pass is
    /// aborted, already-applied units remain valid, and `synchronize` may be
    /// re-invoked by the caller.
    #[error("Explorer error: {0}")]
    ExplorerError(String),

    /// Persistence failure (block database or preferences store). Fatal for
    /// the in-progress pass; committed units stay valid.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Serialization failure at the `FilledBlock` <-> `RawBlock` boundary
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid argument or narrowing-cast failure. Indicates a programmer or
    /// configuration error and is never retried.
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument {
        /// Name of the offending argument
        argument: String,
        /// Description of why the argument is invalid
        message: String,
    },

    /// Keychain operation failure
    #[error("Keychain error: {0}")]
    KeychainError(#[from] KeychainError),

    /// Synchronizer operation failure
    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),
}

impl WalletError {
    /// Convenience constructor for invalid-argument errors
    pub fn invalid_argument(argument: &str, message: &str) -> Self {
        WalletError::InvalidArgument {
            argument: argument.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether re-invoking the failed operation is safe.
    ///
    /// Only explorer/network failures are retryable; storage and argument
    /// errors indicate conditions a retry cannot fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::ExplorerError(_))
    }
}

/// Errors raised by the keychain and address-source layer
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Address derivation failed for the given index
    #[error("Failed to derive address at index {index}: {message}")]
    DerivationFailed {
        /// Index that failed to derive
        index: u32,
        /// Backend failure description
        message: String,
    },

    /// A derived-address index overflowed its storage type
    #[error("Address index overflow: {0}")]
    IndexOverflow(u64),

    /// Durable keychain state could not be read or written
    #[error("Keys database error: {0}")]
    KeysDbError(String),
}

/// Errors raised by the synchronizer state machine
#[derive(Debug, Error)]
pub enum SyncError {
    /// `synchronize` was invoked while a pass is already in progress.
    /// Serializing passes per account is a caller responsibility; this error
    /// is the observable outcome when that contract is violated.
    #[error("A synchronization pass is already in progress")]
    AlreadyRunning,

    /// The explorer reported a chain state the synchronizer cannot reconcile
    #[error("Inconsistent chain state: {0}")]
    InconsistentState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explorer_errors_are_retryable() {
        assert!(WalletError::ExplorerError("timeout".to_string()).is_retryable());
    }

    #[test]
    fn storage_and_argument_errors_are_not_retryable() {
        assert!(!WalletError::StorageError("disk full".to_string()).is_retryable());
        assert!(!WalletError::invalid_argument("count", "overflow").is_retryable());
    }

    #[test]
    fn keychain_error_converts_to_wallet_error() {
        let err: WalletError = KeychainError::IndexOverflow(u32::MAX as u64 + 1).into();
        assert!(matches!(err, WalletError::KeychainError(_)));
    }
}
