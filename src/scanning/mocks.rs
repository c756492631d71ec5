//! Mock explorer for deterministic testing
//!
//! Serves a scripted chain without any network: tests stage confirmed and
//! pending transactions, move the tip, rewrite blocks to simulate reorgs,
//! and inject failures to exercise the synchronizer's error paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;

use crate::data_structures::{BlockHeader, Transaction};
use crate::errors::{WalletError, WalletResult};

use super::explorer::{Explorer, TransactionBulk};

/// Simulated failure switches, each consumed by the next matching call
#[derive(Debug, Clone, Default)]
pub struct MockFailureModes {
    /// Fail the next `transactions` call
    pub fail_transactions: bool,
    /// Fail the next `current_block` call
    pub fail_current_block: bool,
    /// Error message to use for injected failures
    pub error_message: Option<String>,
}

/// Per-method invocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCallCounts {
    /// Calls to `transactions`
    pub transactions: usize,
    /// Calls to `current_block`
    pub current_block: usize,
    /// Calls to `push_transaction`
    pub push_transaction: usize,
}

/// Scripted in-memory explorer
#[derive(Default)]
pub struct MockExplorer {
    tip: Mutex<Option<BlockHeader>>,
    transactions: Mutex<Vec<Transaction>>,
    raw_transactions: Mutex<HashMap<String, Vec<u8>>>,
    pushed: Mutex<Vec<Vec<u8>>>,
    page_size: Mutex<Option<usize>>,
    timestamp: Mutex<i64>,
    failure_modes: Mutex<MockFailureModes>,
    call_counts: Mutex<MockCallCounts>,
}

impl MockExplorer {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chain tip
    pub fn set_tip(&self, tip: BlockHeader) {
        let mut guard = self.tip.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(tip);
    }

    /// Stage a transaction the explorer will serve
    pub fn add_transaction(&self, tx: Transaction) {
        let mut guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(tx);
    }

    /// Rewrite every staged transaction at `height` to sit in `new_header`,
    /// simulating a reorganization of that block
    pub fn reorg_block(&self, height: u32, new_header: BlockHeader) {
        let mut guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        for tx in guard.iter_mut() {
            if tx.block.as_ref().map(|b| b.height) == Some(height) {
                tx.block = Some(new_header.clone());
            }
        }
    }

    /// Drop a staged transaction, simulating eviction from the canonical
    /// chain
    pub fn remove_transaction(&self, tx_hash: &str) {
        let mut guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        guard.retain(|tx| tx.hash != tx_hash);
    }

    /// Register raw bytes for `raw_transaction`
    pub fn set_raw_transaction(&self, tx_hash: &str, raw: Vec<u8>) {
        let mut guard = self
            .raw_transactions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        guard.insert(tx_hash.to_string(), raw);
    }

    /// Serve transactions in pages of `size`, using the session token as the
    /// page cursor
    pub fn set_page_size(&self, size: usize) {
        let mut guard = self.page_size.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(size);
    }

    /// Set the explorer clock
    pub fn set_timestamp(&self, timestamp: i64) {
        let mut guard = self.timestamp.lock().unwrap_or_else(|e| e.into_inner());
        *guard = timestamp;
    }

    /// Arm failure injection
    pub fn set_failure_mode(&self, modes: MockFailureModes) {
        let mut guard = self.failure_modes.lock().unwrap_or_else(|e| e.into_inner());
        *guard = modes;
    }

    /// Snapshot of the call counters
    pub fn call_counts(&self) -> MockCallCounts {
        *self.call_counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Raw transactions handed to `push_transaction`
    pub fn pushed_transactions(&self) -> Vec<Vec<u8>> {
        self.pushed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn injected_error(&self) -> WalletError {
        let guard = self.failure_modes.lock().unwrap_or_else(|e| e.into_inner());
        WalletError::ExplorerError(
            guard
                .error_message
                .clone()
                .unwrap_or_else(|| "mock failure".to_string()),
        )
    }

    fn height_of_hash(&self, block_hash: &str) -> Option<u32> {
        let guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .iter()
            .filter_map(|tx| tx.block.as_ref())
            .find(|b| b.hash == block_hash)
            .map(|b| b.height)
    }
}

#[async_trait]
impl Explorer for MockExplorer {
    async fn transactions(
        &self,
        addresses: &[String],
        from_block_hash: Option<&str>,
        session: Option<&str>,
    ) -> WalletResult<TransactionBulk> {
        {
            let mut counts = self.call_counts.lock().unwrap_or_else(|e| e.into_inner());
            counts.transactions += 1;
        }
        {
            let mut modes = self.failure_modes.lock().unwrap_or_else(|e| e.into_inner());
            if modes.fail_transactions {
                modes.fail_transactions = false;
                drop(modes);
                return Err(self.injected_error());
            }
        }

        let from_height = from_block_hash.and_then(|h| self.height_of_hash(h));
        let guard = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
        let matching: Vec<Transaction> = guard
            .iter()
            .filter(|tx| {
                let touches = tx.outputs.iter().any(|o| addresses.contains(&o.address))
                    || tx
                        .inputs
                        .iter()
                        .any(|i| i.address.as_ref().map(|a| addresses.contains(a)).unwrap_or(false));
                let past_cursor = match (&tx.block, from_height) {
                    (Some(block), Some(height)) => block.height > height,
                    _ => true,
                };
                touches && past_cursor
            })
            .cloned()
            .collect();

        let page_size = *self.page_size.lock().unwrap_or_else(|e| e.into_inner());
        let bulk = match page_size {
            Some(size) => {
                let offset = session.and_then(|s| s.parse::<usize>().ok()).unwrap_or(0);
                let page: Vec<Transaction> =
                    matching.iter().skip(offset).take(size).cloned().collect();
                let has_more = offset + page.len() < matching.len();
                TransactionBulk {
                    transactions: page,
                    has_more,
                    next_session: has_more.then(|| (offset + size).to_string()),
                }
            }
            None => TransactionBulk {
                transactions: matching,
                has_more: false,
                next_session: None,
            },
        };
        Ok(bulk)
    }

    async fn current_block(&self) -> WalletResult<BlockHeader> {
        {
            let mut counts = self.call_counts.lock().unwrap_or_else(|e| e.into_inner());
            counts.current_block += 1;
        }
        {
            let mut modes = self.failure_modes.lock().unwrap_or_else(|e| e.into_inner());
            if modes.fail_current_block {
                modes.fail_current_block = false;
                drop(modes);
                return Err(self.injected_error());
            }
        }
        let guard = self.tip.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .clone()
            .ok_or_else(|| WalletError::ExplorerError("no tip configured".to_string()))
    }

    async fn raw_transaction(&self, tx_hash: &str) -> WalletResult<Vec<u8>> {
        let guard = self
            .raw_transactions
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        guard
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| WalletError::ExplorerError(format!("unknown transaction {tx_hash}")))
    }

    async fn push_transaction(&self, raw: &[u8]) -> WalletResult<String> {
        {
            let mut counts = self.call_counts.lock().unwrap_or_else(|e| e.into_inner());
            counts.push_transaction += 1;
        }
        let mut pushed = self.pushed.lock().unwrap_or_else(|e| e.into_inner());
        pushed.push(raw.to_vec());
        let mut rng = rand::thread_rng();
        let hash: [u8; 16] = rng.gen();
        Ok(hex::encode(hash))
    }

    async fn timestamp(&self) -> WalletResult<i64> {
        let guard = self.timestamp.lock().unwrap_or_else(|e| e.into_inner());
        Ok(*guard)
    }
}
