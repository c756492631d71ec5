//! Unconfirmed transaction pool
//!
//! Holds the transactions the explorer reports without a containing block,
//! and keeps the pending UTXO source in lockstep with them. The synchronizer
//! rebuilds the pool wholesale at the end of every pass; transactions that
//! were mined since simply stop being pending.

use std::sync::{Arc, Mutex};

use crate::data_structures::Transaction;
use crate::keychain::Keychain;
use crate::utxo::InMemoryUtxoSource;

/// Pending transactions plus their derived UTXO view
#[derive(Default)]
pub struct PendingPool {
    transactions: Mutex<Vec<Transaction>>,
    utxo_source: Arc<InMemoryUtxoSource>,
}

impl PendingPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pool contents and rebuild the pending UTXO source at the
    /// given height
    pub fn replace(&self, transactions: Vec<Transaction>, keychain: &Arc<Keychain>, height: u32) {
        self.utxo_source
            .rebuild_from_transactions(&transactions, keychain, height);
        let mut guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        *guard = transactions;
    }

    /// Snapshot of the pending transactions
    pub fn transactions(&self) -> Vec<Transaction> {
        let guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// The UTXO source fed by this pool (highest aggregation priority)
    pub fn utxo_source(&self) -> Arc<InMemoryUtxoSource> {
        self.utxo_source.clone()
    }

    /// Number of pending transactions
    pub fn len(&self) -> usize {
        let guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        guard.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
