//! Synchronizer configuration

use crate::errors::{WalletError, WalletResult};

/// Configuration for a synchronization pipeline
///
/// # Examples
/// ```ignore
/// use wallet_sync_engine::scanning::SyncConfig;
///
/// let config = SyncConfig::default()
///     .with_address_batch_size(20)
///     .with_number_of_unrevertable_blocks(6);
/// config.validate()?;
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of addresses per discovery batch (the gap-limit granularity)
    pub address_batch_size: u32,
    /// Depth below the tip at which a block is considered reorg-safe and is
    /// written to the stable database
    pub number_of_unrevertable_blocks: u32,
    /// Upper bound on discovery iterations within one pass, as a guard
    /// against a misbehaving explorer that keeps reporting new batches
    pub max_discovery_rounds: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            address_batch_size: 20,
            number_of_unrevertable_blocks: 6,
            max_discovery_rounds: 1000,
        }
    }
}

impl SyncConfig {
    /// Set the discovery batch size
    pub fn with_address_batch_size(mut self, size: u32) -> Self {
        self.address_batch_size = size;
        self
    }

    /// Set the reorg window depth
    pub fn with_number_of_unrevertable_blocks(mut self, blocks: u32) -> Self {
        self.number_of_unrevertable_blocks = blocks;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> WalletResult<()> {
        if self.address_batch_size == 0 {
            return Err(WalletError::invalid_argument(
                "address_batch_size",
                "must be at least 1",
            ));
        }
        if self.number_of_unrevertable_blocks == 0 {
            return Err(WalletError::invalid_argument(
                "number_of_unrevertable_blocks",
                "must be at least 1",
            ));
        }
        if self.max_discovery_rounds == 0 {
            return Err(WalletError::invalid_argument(
                "max_discovery_rounds",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
