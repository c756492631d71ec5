//! Block-database UTXO source
//!
//! Derives a source list by walking one `BlockchainDatabase` instance (stable
//! or unstable) in ascending height order and applying the keychain's
//! address-ownership predicate. Recomputed in full on every call, so an
//! evicted unstable block can never leak stale outputs into the view.

use std::sync::Arc;

use async_trait::async_trait;

use crate::data_structures::{UtxoKey, UtxoSourceList, UtxoValue};
use crate::errors::WalletResult;
use crate::keychain::Keychain;
use crate::storage::BlockchainDatabase;

use super::source::UtxoSource;

/// UTXO source computed from a block database and a keychain
#[derive(Clone)]
pub struct DatabaseUtxoSource {
    database: BlockchainDatabase,
    keychain: Arc<Keychain>,
}

impl DatabaseUtxoSource {
    /// Create a source over the given database and keychain
    pub fn new(database: BlockchainDatabase, keychain: Arc<Keychain>) -> Self {
        Self { database, keychain }
    }
}

#[async_trait]
impl UtxoSource for DatabaseUtxoSource {
    async fn source_list(&self) -> WalletResult<UtxoSourceList> {
        let blocks = self.database.get_blocks(0, u32::MAX).await?;
        let height = blocks.last().map(|b| b.header.height).unwrap_or(0);

        let mut list = UtxoSourceList::empty_at(height);
        for block in &blocks {
            for tx in &block.transactions {
                for output in &tx.outputs {
                    if self.keychain.contains(&output.address) {
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
                        .map(|address| self.keychain.contains(address))
                        .unwrap_or(false);
                    let key =
                        UtxoKey::new(input.previous_tx_hash.clone(), input.previous_output_index);
                    // Spends of outputs created outside this database segment
                    // matter too: the aggregation removes them from
                    // lower-priority sources.
                    if owned || list.available.contains_key(&key) {
                        list.add_spent(key);
                    }
                }
            }
        }
        Ok(list)
    }
}
