//! Derived account views
//!
//! Pure projections over synchronized state: balance from the aggregated
//! UTXO set, operation history from persisted transactions plus keychain
//! membership. Neither maintains incremental state of its own, so both are
//! re-derivable at any time and cannot drift.

pub mod balance;
pub mod operations;

pub use balance::BalanceService;
pub use operations::{OperationFilter, OperationService};
