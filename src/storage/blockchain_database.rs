//! Domain-level block database
//!
//! Wraps a byte-oriented `BlockchainDb` backend and speaks `FilledBlock`.
//! Every account owns two instances: a *stable* database for blocks past the
//! reorg window and an *unstable* database for recent blocks that may still
//! be replaced. Reorg eviction is the upsert semantics of `add_blocks`: a
//! later write for an existing height overwrites, it never duplicates.

use std::sync::Arc;

use tracing::debug;

use crate::data_structures::{BlockHeader, FilledBlock};
use crate::errors::WalletResult;

use super::blockchain_db::BlockchainDb;

/// Height-indexed store of filled blocks with range queries and pruning
#[derive(Clone)]
pub struct BlockchainDatabase {
    db: Arc<dyn BlockchainDb>,
}

impl BlockchainDatabase {
    /// Create a database over the given backend
    pub fn new(db: Arc<dyn BlockchainDb>) -> Self {
        Self { db }
    }

    /// Filled blocks with heights in `[height_from, height_to)`, ascending
    pub async fn get_blocks(
        &self,
        height_from: u32,
        height_to: u32,
    ) -> WalletResult<Vec<FilledBlock>> {
        let raw_blocks = self.db.get_blocks(height_from, height_to).await?;
        raw_blocks.iter().map(FilledBlock::from_raw).collect()
    }

    /// The filled block at exactly `height`, if present
    pub async fn get_block(&self, height: u32) -> WalletResult<Option<FilledBlock>> {
        match self.db.get_block(height).await? {
            Some(raw) => Ok(Some(FilledBlock::from_raw(&raw)?)),
            None => Ok(None),
        }
    }

    /// Header of the highest stored block, or `None` when empty
    pub async fn get_last_block_header(&self) -> WalletResult<Option<BlockHeader>> {
        match self.db.get_last_block().await? {
            Some((_, raw)) => Ok(Some(FilledBlock::from_raw(&raw)?.header)),
            None => Ok(None),
        }
    }

    /// Header of the highest stored block, or the supplied genesis when empty
    pub async fn get_last_block_header_or(
        &self,
        genesis: BlockHeader,
    ) -> WalletResult<BlockHeader> {
        Ok(self.get_last_block_header().await?.unwrap_or(genesis))
    }

    /// Insert or replace blocks, one per height.
    ///
    /// Idempotent upsert: writing a block for an already-populated height
    /// replaces the previous content, which is how a reorganized branch is
    /// evicted.
    pub async fn add_blocks(&self, blocks: &[FilledBlock]) -> WalletResult<()> {
        for block in blocks {
            let raw = block.to_raw()?;
            self.db.add_block(block.header.height, raw).await?;
            debug!(
                height = block.header.height,
                hash = %block.header.hash,
                transactions = block.transactions.len(),
                "block stored"
            );
        }
        Ok(())
    }

    /// Remove blocks with heights in `[height_from, height_to)`
    pub async fn remove_blocks(&self, height_from: u32, height_to: u32) -> WalletResult<()> {
        self.db.remove_blocks(height_from, height_to).await
    }

    /// Remove all blocks with height strictly below `height_to`
    pub async fn remove_blocks_up_to(&self, height_to: u32) -> WalletResult<()> {
        self.db.remove_blocks_up_to(height_to).await
    }

    /// Clear the database
    pub async fn clean_all(&self) -> WalletResult<()> {
        self.db.clean_all().await
    }
}
