//! Persistent caching UTXO source
//!
//! Wraps another source and mirrors its list into a backing raw block store,
//! keyed by the list height. The snapshot is only written when the inner
//! source's height has advanced past the last flush, avoiding redundant
//! writes on repeated aggregation calls. `restore` serves the last snapshot
//! so a view survives restarts before the first synchronization pass.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::data_structures::UtxoSourceList;
use crate::errors::{WalletError, WalletResult};
use crate::storage::BlockchainDb;

use super::source::UtxoSource;

/// Write-through snapshot cache around a `UtxoSource`
pub struct PersistentUtxoSource {
    inner: Arc<dyn UtxoSource>,
    snapshots: Arc<dyn BlockchainDb>,
    last_flushed_height: Mutex<Option<u32>>,
}

impl PersistentUtxoSource {
    /// Create a persistent source over `inner`, snapshotting into `snapshots`
    pub fn new(inner: Arc<dyn UtxoSource>, snapshots: Arc<dyn BlockchainDb>) -> Self {
        Self {
            inner,
            snapshots,
            last_flushed_height: Mutex::new(None),
        }
    }

    /// The most recent persisted snapshot, if one exists
    pub async fn restore(&self) -> WalletResult<Option<UtxoSourceList>> {
        match self.snapshots.get_last_block().await? {
            Some((_, raw)) => {
                let list: UtxoSourceList = borsh::from_slice(&raw)
                    .map_err(|e| WalletError::SerializationError(e.to_string()))?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }

    async fn flush_if_advanced(&self, list: &UtxoSourceList) -> WalletResult<()> {
        let mut last = self.last_flushed_height.lock().await;
        if last.map(|h| list.height <= h).unwrap_or(false) {
            return Ok(());
        }
        let raw =
            borsh::to_vec(list).map_err(|e| WalletError::SerializationError(e.to_string()))?;
        self.snapshots.add_block(list.height, raw).await?;
        // One snapshot is enough; older heights are dead weight
        self.snapshots.remove_blocks_up_to(list.height).await?;
        *last = Some(list.height);
        debug!(height = list.height, "utxo snapshot flushed");
        Ok(())
    }
}

#[async_trait]
impl UtxoSource for PersistentUtxoSource {
    async fn source_list(&self) -> WalletResult<UtxoSourceList> {
        let list = self.inner.source_list().await?;
        self.flush_if_advanced(&list).await?;
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{UtxoKey, UtxoValue};
    use crate::storage::InMemoryBlockchainDb;
    use crate::utxo::memory_source::InMemoryUtxoSource;
    use primitive_types::U256;

    fn list_at(height: u32, tag: &str) -> UtxoSourceList {
        let mut list = UtxoSourceList::empty_at(height);
        list.add_available(
            UtxoKey::new(tag, 0),
            UtxoValue::new(U256::from(10u64), "addr"),
        );
        list
    }

    #[tokio::test]
    async fn flushes_only_when_height_advances() {
        let inner = Arc::new(InMemoryUtxoSource::new());
        let snapshots = Arc::new(InMemoryBlockchainDb::new());
        let source = PersistentUtxoSource::new(inner.clone(), snapshots.clone());

        inner.replace(list_at(100, "tx1"));
        source.source_list().await.unwrap();
        let first = snapshots.get_last_block().await.unwrap().unwrap();
        assert_eq!(first.0, 100);

        // Same height: content changes are not re-flushed
        inner.replace(list_at(100, "tx2"));
        source.source_list().await.unwrap();
        let unchanged = snapshots.get_last_block().await.unwrap().unwrap();
        assert_eq!(unchanged.1, first.1);

        // Height advances: new snapshot replaces the old one
        inner.replace(list_at(101, "tx3"));
        source.source_list().await.unwrap();
        let (height, _) = snapshots.get_last_block().await.unwrap().unwrap();
        assert_eq!(height, 101);
        assert!(snapshots.get_block(100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_returns_last_snapshot() {
        let inner = Arc::new(InMemoryUtxoSource::new());
        let snapshots = Arc::new(InMemoryBlockchainDb::new());
        let source = PersistentUtxoSource::new(inner.clone(), snapshots.clone());

        assert!(source.restore().await.unwrap().is_none());

        inner.replace(list_at(42, "tx1"));
        let served = source.source_list().await.unwrap();
        let restored = source.restore().await.unwrap().unwrap();
        assert_eq!(restored, served);
    }
}
