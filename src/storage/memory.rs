//! In-memory `BlockchainDb` backend
//!
//! A mutex-guarded ordered map keyed by height. Every mutating call holds the
//! lock for its whole duration, so readers observe each block fully written
//! or not at all.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::data_structures::RawBlock;
use crate::errors::WalletResult;

use super::blockchain_db::BlockchainDb;

/// Mutex-guarded in-memory block store
#[derive(Debug, Default)]
pub struct InMemoryBlockchainDb {
    blocks: Mutex<BTreeMap<u32, RawBlock>>,
}

impl InMemoryBlockchainDb {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockchainDb for InMemoryBlockchainDb {
    async fn get_blocks(
        &self,
        height_from: u32,
        height_to: u32,
    ) -> WalletResult<Vec<RawBlock>> {
        let blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(blocks
            .range(height_from..height_to)
            .map(|(_, raw)| raw.clone())
            .collect())
    }

    async fn get_block(&self, height: u32) -> WalletResult<Option<RawBlock>> {
        let blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(blocks.get(&height).cloned())
    }

    async fn get_last_block(&self) -> WalletResult<Option<(u32, RawBlock)>> {
        let blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(blocks
            .iter()
            .next_back()
            .map(|(height, raw)| (*height, raw.clone())))
    }

    async fn add_block(&self, height: u32, block: RawBlock) -> WalletResult<()> {
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        blocks.insert(height, block);
        Ok(())
    }

    async fn remove_blocks(&self, height_from: u32, height_to: u32) -> WalletResult<()> {
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        let doomed: Vec<u32> = blocks.range(height_from..height_to).map(|(h, _)| *h).collect();
        for height in doomed {
            blocks.remove(&height);
        }
        Ok(())
    }

    async fn remove_blocks_up_to(&self, height_to: u32) -> WalletResult<()> {
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        let doomed: Vec<u32> = blocks.range(..height_to).map(|(h, _)| *h).collect();
        for height in doomed {
            blocks.remove(&height);
        }
        Ok(())
    }

    async fn clean_all(&self) -> WalletResult<()> {
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        blocks.clear();
        Ok(())
    }
}
