//! Block-level synchronization
//!
//! One pass fetches every transaction touching the watched addresses, widens
//! the discovery window until it stops growing, groups the confirmed
//! transactions into filled blocks, and applies them to the stable and
//! unstable databases. Blocks deeper than the reorg window land in the stable
//! database and are never touched again; blocks above it stay unstable and
//! may be replaced when the chain reorganizes.
//!
//! Reorg eviction is fetch-driven: an orphaned unstable block is replaced
//! only when the explorer serves a wallet transaction inside its canonical
//! successor at the same height. A successor containing no wallet
//! transactions is never reported, so the orphan it displaced survives
//! locally until a later transaction at that height is fetched. The explorer
//! seam has no hash-at-height query to close this gap.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::data_structures::{BlockHeader, FilledBlock, Transaction};
use crate::errors::{WalletError, WalletResult};
use crate::keychain::{AddressSources, Keychain};
use crate::storage::BlockchainDatabase;

use super::config::SyncConfig;
use super::explorer::Explorer;
use super::pending_pool::PendingPool;

/// Lifecycle of a synchronization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass in progress; the next one may start
    Idle,
    /// Fetching transactions and widening the discovery window
    Fetching,
    /// Writing fetched blocks to the databases
    Applying,
    /// A non-retryable error occurred; local state may be inconsistent
    Failed,
}

/// One detected block replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgRecord {
    /// Height of the replaced block
    pub height: u32,
    /// Hash previously stored at that height
    pub old_hash: String,
    /// Hash of the canonical replacement
    pub new_hash: String,
}

/// Outcome of one completed synchronization pass
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Distinct transactions fetched during the pass
    pub new_transactions: usize,
    /// Blocks written to the stable database, graduations included
    pub stable_blocks: usize,
    /// Blocks written to the unstable database
    pub unstable_blocks: usize,
    /// Unstable blocks replaced by a different canonical block
    pub reorgs: Vec<ReorgRecord>,
    /// Unconfirmed transactions left in the pending pool
    pub pending_transactions: usize,
}

/// Fetch-and-apply engine for one account
pub struct BlocksSynchronizer {
    explorer: Arc<dyn Explorer>,
    keychain: Arc<Keychain>,
    address_sources: AddressSources,
    stable: BlockchainDatabase,
    unstable: BlockchainDatabase,
    pending_pool: Arc<PendingPool>,
    config: SyncConfig,
    state: Mutex<SyncState>,
}

impl std::fmt::Debug for BlocksSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlocksSynchronizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BlocksSynchronizer {
    /// Create a synchronizer. Validates the configuration and derives the
    /// initial discovery batch.
    pub fn new(
        explorer: Arc<dyn Explorer>,
        keychain: Arc<Keychain>,
        stable: BlockchainDatabase,
        unstable: BlockchainDatabase,
        pending_pool: Arc<PendingPool>,
        config: SyncConfig,
    ) -> WalletResult<Self> {
        config.validate()?;
        let address_sources = AddressSources::new(keychain.clone(), config.address_batch_size)?;
        Ok(Self {
            explorer,
            keychain,
            address_sources,
            stable,
            unstable,
            pending_pool,
            config,
            state: Mutex::new(SyncState::Idle),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The discovery window driven by this synchronizer
    pub fn address_sources(&self) -> &AddressSources {
        &self.address_sources
    }

    /// Run one synchronization pass against the given tip.
    ///
    /// `from_block_hash` resumes the explorer's transaction stream after a
    /// previously applied block; `None` replays from the beginning of the
    /// chain. A retryable failure leaves the synchronizer `Idle` so the
    /// caller may simply run another pass; a storage or serialization
    /// failure parks it in `Failed`.
    pub async fn synchronize(
        &self,
        from_block_hash: Option<&str>,
        tip: &BlockHeader,
    ) -> WalletResult<SyncReport> {
        let result = self.run(from_block_hash, tip).await;
        let next_state = match &result {
            Ok(_) => SyncState::Idle,
            Err(e) if e.is_retryable() => SyncState::Idle,
            Err(_) => SyncState::Failed,
        };
        self.set_state(next_state);
        result
    }

    async fn run(
        &self,
        from_block_hash: Option<&str>,
        tip: &BlockHeader,
    ) -> WalletResult<SyncReport> {
        self.set_state(SyncState::Fetching);
        let transactions = self.fetch_to_fixed_point(from_block_hash).await?;

        self.set_state(SyncState::Applying);
        self.apply(transactions, tip).await
    }

    /// Fetch transactions and widen the discovery window until a fetch over
    /// the widened window discovers nothing new.
    async fn fetch_to_fixed_point(
        &self,
        from_block_hash: Option<&str>,
    ) -> WalletResult<Vec<Transaction>> {
        for round in 0..self.config.max_discovery_rounds {
            let addresses = self.address_sources.all_addresses();
            let transactions = self.fetch_all_pages(&addresses, from_block_hash).await?;

            if !self.widen_window(&transactions)? {
                debug!(round, transactions = transactions.len(), "discovery converged");
                return Ok(transactions);
            }
        }
        // The explorer kept reporting usage in every freshly appended batch
        // until the round limit ran out
        Err(WalletError::ExplorerError(format!(
            "address discovery did not converge within {} rounds",
            self.config.max_discovery_rounds
        )))
    }

    /// Drain the explorer's paged stream, threading the continuation token
    /// from each bulk into the next request. A bulk claiming more pages
    /// without advancing the token would re-serve the same page forever, so
    /// that stream is treated as broken.
    async fn fetch_all_pages(
        &self,
        addresses: &[String],
        from_block_hash: Option<&str>,
    ) -> WalletResult<Vec<Transaction>> {
        let mut transactions = Vec::new();
        let mut session: Option<String> = None;
        loop {
            let bulk = self
                .explorer
                .transactions(addresses, from_block_hash, session.as_deref())
                .await?;
            transactions.extend(bulk.transactions);
            if !bulk.has_more {
                return Ok(transactions);
            }
            if bulk.next_session.is_none() || bulk.next_session == session {
                return Err(WalletError::ExplorerError(
                    "paged transaction stream did not advance its session token".to_string(),
                ));
            }
            session = bulk.next_session;
        }
    }

    /// Mark every observed address as used and extend the watched window
    /// batch by batch. Returns whether the window grew.
    fn widen_window(&self, transactions: &[Transaction]) -> WalletResult<bool> {
        let mut used_batches = BTreeSet::new();
        for tx in transactions {
            for address in observed_addresses(tx) {
                if let Some(index) = self.keychain.index_of(address) {
                    self.keychain.mark_as_used(address)?;
                    used_batches.insert(self.address_sources.batch_index_for(index));
                }
            }
        }

        let mut grew = false;
        for batch_index in used_batches {
            grew |= self.address_sources.mark_batch_as_used(batch_index)?;
        }
        Ok(grew)
    }

    async fn apply(
        &self,
        transactions: Vec<Transaction>,
        tip: &BlockHeader,
    ) -> WalletResult<SyncReport> {
        let mut seen = HashSet::new();
        let mut confirmed: BTreeMap<u32, FilledBlock> = BTreeMap::new();
        let mut pending = Vec::new();
        let mut new_transactions = 0usize;

        for tx in transactions {
            if !seen.insert(tx.hash.clone()) {
                continue;
            }
            new_transactions += 1;
            match tx.block.clone() {
                Some(header) => {
                    confirmed
                        .entry(header.height)
                        .or_insert_with(|| FilledBlock::new(header, Vec::new()))
                        .transactions
                        .push(tx);
                }
                None => pending.push(tx),
            }
        }

        let stable_threshold = tip
            .height
            .saturating_sub(self.config.number_of_unrevertable_blocks);

        let mut report = SyncReport {
            new_transactions,
            ..Default::default()
        };

        for block in confirmed.values() {
            let height = block.header.height;
            if height < stable_threshold {
                self.stable.add_blocks(std::slice::from_ref(block)).await?;
                report.stable_blocks += 1;
            } else {
                if let Some(existing) = self.unstable.get_block(height).await? {
                    if existing.header.hash != block.header.hash {
                        info!(
                            height,
                            old_hash = %existing.header.hash,
                            new_hash = %block.header.hash,
                            "unstable block replaced by reorganization"
                        );
                        report.reorgs.push(ReorgRecord {
                            height,
                            old_hash: existing.header.hash,
                            new_hash: block.header.hash.clone(),
                        });
                    }
                }
                self.unstable.add_blocks(std::slice::from_ref(block)).await?;
                report.unstable_blocks += 1;
            }
        }

        // Blocks that have sunk below the reorg window graduate to the
        // stable database
        let graduating = self.unstable.get_blocks(0, stable_threshold).await?;
        if !graduating.is_empty() {
            self.stable.add_blocks(&graduating).await?;
            self.unstable.remove_blocks_up_to(stable_threshold).await?;
            report.stable_blocks += graduating.len();
        }

        report.pending_transactions = pending.len();
        self.pending_pool.replace(pending, &self.keychain, tip.height);

        Ok(report)
    }

    fn set_state(&self, state: SyncState) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *guard = state;
    }
}

/// Keychain-relevant addresses a transaction touches
fn observed_addresses(tx: &Transaction) -> impl Iterator<Item = &str> {
    tx.outputs
        .iter()
        .map(|o| o.address.as_str())
        .chain(tx.inputs.iter().filter_map(|i| i.address.as_deref()))
}
