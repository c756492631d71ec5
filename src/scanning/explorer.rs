//! Blockchain explorer seam
//!
//! The engine consumes a remote explorer through this trait only; transport,
//! wire format, and JSON parsing live behind it. Every call is a suspension
//! point and may fail transiently: failures surface as
//! `WalletError::ExplorerError` and abort the in-progress pass without
//! invalidating already-applied work.

use async_trait::async_trait;

use crate::data_structures::{BlockHeader, Transaction};
use crate::errors::WalletResult;

/// One page of the explorer's transaction stream
#[derive(Debug, Clone, Default)]
pub struct TransactionBulk {
    /// Transactions touching the requested addresses
    pub transactions: Vec<Transaction>,
    /// Whether another page remains
    pub has_more: bool,
    /// Continuation token for the next page. Must differ from the token the
    /// page was requested with whenever `has_more` is set, otherwise the
    /// fetch loop treats the stream as stuck and fails the pass.
    pub next_session: Option<String>,
}

impl TransactionBulk {
    /// A bulk that terminates the fetch loop
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Remote blockchain data source
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Transactions touching any of `addresses`, starting after
    /// `from_block_hash` when given (otherwise from the beginning of the
    /// chain). `session` is an opaque pagination token some explorers
    /// require.
    async fn transactions(
        &self,
        addresses: &[String],
        from_block_hash: Option<&str>,
        session: Option<&str>,
    ) -> WalletResult<TransactionBulk>;

    /// The explorer's current chain tip
    async fn current_block(&self) -> WalletResult<BlockHeader>;

    /// Raw bytes of a transaction
    async fn raw_transaction(&self, tx_hash: &str) -> WalletResult<Vec<u8>>;

    /// Broadcast a raw transaction, returning its hash
    async fn push_transaction(&self, raw: &[u8]) -> WalletResult<String>;

    /// The explorer's notion of the current time, as a unix timestamp
    async fn timestamp(&self) -> WalletResult<i64>;
}
