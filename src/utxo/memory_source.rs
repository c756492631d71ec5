//! In-memory UTXO source
//!
//! Backs the pending (unconfirmed) pool: the synchronizer rebuilds its state
//! from the current set of unconfirmed transactions after every pass. The
//! height only ever moves forward, matching the source-list contract.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::data_structures::{Transaction, UtxoKey, UtxoSourceList, UtxoValue};
use crate::errors::WalletResult;
use crate::keychain::Keychain;

use super::source::UtxoSource;

/// Mutex-guarded in-memory UTXO source
#[derive(Debug, Default)]
pub struct InMemoryUtxoSource {
    state: Mutex<UtxoSourceList>,
}

impl InMemoryUtxoSource {
    /// Create an empty source at height zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the source state wholesale.
    ///
    /// The height never regresses: a replacement carrying a lower height
    /// keeps the previous watermark.
    pub fn replace(&self, mut list: UtxoSourceList) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        list.height = list.height.max(state.height);
        *state = list;
    }

    /// Rebuild the state from a set of transactions.
    ///
    /// Outputs paying a keychain address become available; inputs consuming
    /// any previously observed output are recorded as spent. Used by the
    /// synchronizer to mirror the unconfirmed pool after each pass.
    pub fn rebuild_from_transactions(
        &self,
        transactions: &[Transaction],
        keychain: &Arc<Keychain>,
        height: u32,
    ) {
        let mut list = UtxoSourceList::empty_at(height);
        for tx in transactions {
            for output in &tx.outputs {
                if keychain.contains(&output.address) {
                    list.add_available(
                        UtxoKey::new(tx.hash.clone(), output.index),
                        UtxoValue::new(output.amount, output.address.clone()),
                    );
                }
            }
            for input in &tx.inputs {
                let owned = input
                    .address
                    .as_deref()
                    .map(|address| keychain.contains(address))
                    .unwrap_or(false);
                let key = UtxoKey::new(input.previous_tx_hash.clone(), input.previous_output_index);
                if owned || list.available.contains_key(&key) {
                    list.add_spent(key);
                }
            }
        }
        self.replace(list);
    }

    /// Drop all state, keeping the height watermark
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let height = state.height;
        *state = UtxoSourceList::empty_at(height);
    }
}

#[async_trait]
impl UtxoSource for InMemoryUtxoSource {
    async fn source_list(&self) -> WalletResult<UtxoSourceList> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.clone())
    }
}
