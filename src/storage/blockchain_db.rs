//! Byte-oriented block storage seam
//!
//! The lowest persistence layer knows nothing about the domain model: it
//! stores opaque `RawBlock` payloads keyed by height. Each mutating call must
//! be applied atomically by the backend (a mutex-guarded map in memory, a
//! batched write in a disk store), which is what makes a `FilledBlock` either
//! fully visible or absent, never partial.

use async_trait::async_trait;

use crate::data_structures::RawBlock;
use crate::errors::WalletResult;

/// Low-level height-indexed raw block store
#[async_trait]
pub trait BlockchainDb: Send + Sync {
    /// Raw blocks with heights in `[height_from, height_to)`, ascending
    async fn get_blocks(&self, height_from: u32, height_to: u32)
        -> WalletResult<Vec<RawBlock>>;

    /// Raw block at exactly `height`, if present
    async fn get_block(&self, height: u32) -> WalletResult<Option<RawBlock>>;

    /// The highest stored block with its height, if any
    async fn get_last_block(&self) -> WalletResult<Option<(u32, RawBlock)>>;

    /// Insert or replace the block at `height` (one block per height)
    async fn add_block(&self, height: u32, block: RawBlock) -> WalletResult<()>;

    /// Remove blocks with heights in `[height_from, height_to)`
    async fn remove_blocks(&self, height_from: u32, height_to: u32) -> WalletResult<()>;

    /// Remove all blocks with height strictly below `height_to`
    async fn remove_blocks_up_to(&self, height_to: u32) -> WalletResult<()>;

    /// Clear the store
    async fn clean_all(&self) -> WalletResult<()>;
}
