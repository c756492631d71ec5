//! Operation history projection
//!
//! Rebuilds send/receive operations from the persisted blocks (stable and
//! unstable) and the unconfirmed pool, using the keychain's ownership
//! predicate. Operations are derived on every query; they are never stored as
//! primary truth.

use std::sync::Arc;

use primitive_types::U256;

use crate::data_structures::{Operation, OperationType, Transaction};
use crate::errors::WalletResult;
use crate::keychain::Keychain;
use crate::scanning::PendingPool;
use crate::storage::BlockchainDatabase;

/// Query filter for the operation history
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    /// Only operations at or above this block height
    pub from_height: Option<u32>,
    /// Only operations strictly below this block height
    pub to_height: Option<u32>,
    /// Skip unconfirmed and unstable operations (trusted history only)
    pub stable_only: bool,
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Number of results to skip, for pagination
    pub offset: Option<usize>,
}

impl OperationFilter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a block height range `[from, to)`
    pub fn with_height_range(mut self, from: u32, to: u32) -> Self {
        self.from_height = Some(from);
        self.to_height = Some(to);
        self
    }

    /// Only operations from the stable chain
    pub fn stable_only(mut self) -> Self {
        self.stable_only = true;
        self
    }

    /// Set pagination limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set pagination offset
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Paginated operation history over the synchronized state
pub struct OperationService {
    stable: BlockchainDatabase,
    unstable: BlockchainDatabase,
    pending: Arc<PendingPool>,
    keychain: Arc<Keychain>,
}

impl OperationService {
    /// Create the service over the account's databases, pool, and keychain
    pub fn new(
        stable: BlockchainDatabase,
        unstable: BlockchainDatabase,
        pending: Arc<PendingPool>,
        keychain: Arc<Keychain>,
    ) -> Self {
        Self {
            stable,
            unstable,
            pending,
            keychain,
        }
    }

    /// Operations matching `filter`, ascending by block height with
    /// unconfirmed operations last.
    ///
    /// Unconfirmed operations have no height, so an explicit height range
    /// excludes them along with every block outside the range.
    pub async fn operations(&self, filter: &OperationFilter) -> WalletResult<Vec<Operation>> {
        let from = filter.from_height.unwrap_or(0);
        let to = filter.to_height.unwrap_or(u32::MAX);
        let height_bounded = filter.from_height.is_some() || filter.to_height.is_some();

        let mut operations = Vec::new();
        for block in self.stable.get_blocks(from, to).await? {
            for tx in &block.transactions {
                operations.extend(self.project(tx));
            }
        }
        if !filter.stable_only {
            for block in self.unstable.get_blocks(from, to).await? {
                for tx in &block.transactions {
                    operations.extend(self.project(tx));
                }
            }
            if !height_bounded {
                for tx in self.pending.transactions() {
                    operations.extend(self.project(&tx));
                }
            }
        }

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(operations.into_iter().skip(offset).take(limit).collect())
    }

    /// Project one transaction onto zero or one operations, from the
    /// account's point of view
    fn project(&self, tx: &Transaction) -> Option<Operation> {
        let received: U256 = tx
            .outputs
            .iter()
            .filter(|o| self.keychain.contains(&o.address))
            .fold(U256::zero(), |sum, o| sum + o.amount);
        let sent: U256 = tx
            .inputs
            .iter()
            .filter(|i| {
                i.address
                    .as_deref()
                    .map(|a| self.keychain.contains(a))
                    .unwrap_or(false)
            })
            .fold(U256::zero(), |sum, i| sum + i.amount.unwrap_or_default());

        if sent > U256::zero() {
            // Net outflow: amount excludes change back to our own addresses
            // and the fees, floored at zero for self-transfers
            let amount = sent
                .saturating_sub(received)
                .saturating_sub(tx.fees);
            Some(Operation {
                tx_hash: tx.hash.clone(),
                operation_type: OperationType::Send,
                amount,
                fees: tx.fees,
                senders: tx
                    .inputs
                    .iter()
                    .filter_map(|i| i.address.clone())
                    .collect(),
                recipients: tx
                    .outputs
                    .iter()
                    .filter(|o| !self.keychain.contains(&o.address))
                    .map(|o| o.address.clone())
                    .collect(),
                block: tx.block.clone(),
                date: tx.received_at,
            })
        } else if received > U256::zero() {
            Some(Operation {
                tx_hash: tx.hash.clone(),
                operation_type: OperationType::Receive,
                amount: received,
                fees: tx.fees,
                senders: tx
                    .inputs
                    .iter()
                    .filter_map(|i| i.address.clone())
                    .collect(),
                recipients: tx
                    .outputs
                    .iter()
                    .filter(|o| self.keychain.contains(&o.address))
                    .map(|o| o.address.clone())
                    .collect(),
                block: tx.block.clone(),
                date: tx.received_at,
            })
        } else {
            None
        }
    }
}
