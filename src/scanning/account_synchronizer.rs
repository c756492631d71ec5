//! Account-level synchronization
//!
//! Drives the block synchronizer for one account: resolves the explorer tip,
//! picks the resume point from the databases, emits progress events, and
//! records a checkpoint when a pass completes. This is the entry point host
//! applications call.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::data_structures::BlockHeader;
use crate::errors::{SyncError, WalletResult};
use crate::storage::BlockchainDatabase;

use super::blocks_synchronizer::{BlocksSynchronizer, SyncReport, SyncState};
use super::events::{SyncEvent, SyncEventDispatcher, SyncEventListener};
use super::explorer::Explorer;

/// Checkpoint of the last completed pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastSynced {
    /// Tip height the account was synchronized to
    pub height: u32,
    /// Unix timestamp the pass completed at
    pub timestamp: i64,
}

/// Synchronization driver for one account
pub struct AccountSynchronizer {
    explorer: Arc<dyn Explorer>,
    blocks_synchronizer: BlocksSynchronizer,
    stable: BlockchainDatabase,
    unstable: BlockchainDatabase,
    dispatcher: SyncEventDispatcher,
    last_synced: Mutex<Option<LastSynced>>,
}

impl AccountSynchronizer {
    /// Create an account synchronizer over an already-configured block
    /// synchronizer and the databases it writes to
    pub fn new(
        explorer: Arc<dyn Explorer>,
        blocks_synchronizer: BlocksSynchronizer,
        stable: BlockchainDatabase,
        unstable: BlockchainDatabase,
    ) -> Self {
        Self {
            explorer,
            blocks_synchronizer,
            stable,
            unstable,
            dispatcher: SyncEventDispatcher::new(),
            last_synced: Mutex::new(None),
        }
    }

    /// Register a progress event listener
    pub async fn register_listener(&self, listener: Box<dyn SyncEventListener>) {
        self.dispatcher.register(listener).await;
    }

    /// Checkpoint of the last completed pass, if any
    pub fn last_synchronized(&self) -> Option<LastSynced> {
        *self.last_synced.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one synchronization pass.
    ///
    /// Rejects overlapping passes and refuses to run after a non-retryable
    /// failure has parked the block synchronizer. Events are dispatched over
    /// the whole pass; a failed pass ends with a `Failed` event carrying the
    /// error description.
    pub async fn synchronize(&self) -> WalletResult<SyncReport> {
        match self.blocks_synchronizer.state() {
            SyncState::Idle => {}
            SyncState::Failed => {
                return Err(SyncError::InconsistentState(
                    "previous pass failed; reset local state before synchronizing".to_string(),
                )
                .into())
            }
            SyncState::Fetching | SyncState::Applying => {
                return Err(SyncError::AlreadyRunning.into())
            }
        }

        let result = self.run().await;
        if let Err(e) = &result {
            self.dispatcher
                .dispatch(&SyncEvent::Failed {
                    message: e.to_string(),
                })
                .await;
        }
        result
    }

    async fn run(&self) -> WalletResult<SyncReport> {
        let tip = self.explorer.current_block().await?;
        let resume = self.resume_header().await?;
        let (from_hash, from_height) = match resume {
            Some(header) => (Some(header.hash), header.height),
            None => (None, 0),
        };

        self.dispatcher
            .dispatch(&SyncEvent::Started {
                from_height,
                tip_height: tip.height,
            })
            .await;

        let report = self
            .blocks_synchronizer
            .synchronize(from_hash.as_deref(), &tip)
            .await?;

        for reorg in &report.reorgs {
            self.dispatcher
                .dispatch(&SyncEvent::Reorg {
                    height: reorg.height,
                    old_hash: reorg.old_hash.clone(),
                    new_hash: reorg.new_hash.clone(),
                })
                .await;
        }
        self.dispatcher
            .dispatch(&SyncEvent::BatchApplied {
                transactions: report.new_transactions,
                stable_blocks: report.stable_blocks,
                unstable_blocks: report.unstable_blocks,
            })
            .await;
        self.dispatcher
            .dispatch(&SyncEvent::Completed {
                tip_height: tip.height,
                new_transactions: report.new_transactions,
            })
            .await;

        self.record_checkpoint(tip.height).await;
        info!(
            tip_height = tip.height,
            transactions = report.new_transactions,
            "synchronization pass completed"
        );
        Ok(report)
    }

    /// The newest block already applied, looking at the unstable database
    /// first and falling back to the stable one
    async fn resume_header(&self) -> WalletResult<Option<BlockHeader>> {
        if let Some(header) = self.unstable.get_last_block_header().await? {
            return Ok(Some(header));
        }
        self.stable.get_last_block_header().await
    }

    /// Record the checkpoint, preferring the explorer's clock over the local
    /// one so checkpoints stay comparable across devices
    async fn record_checkpoint(&self, height: u32) {
        let timestamp = match self.explorer.timestamp().await {
            Ok(ts) => ts,
            Err(_) => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
        };
        let mut guard = self.last_synced.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(LastSynced { height, timestamp });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WalletError;
    use crate::keychain::{Blake2bAddressDeriver, Keychain, KeysDb, MemoryPreferences};
    use crate::scanning::config::SyncConfig;
    use crate::scanning::mocks::{MockExplorer, MockFailureModes};
    use crate::scanning::pending_pool::PendingPool;
    use crate::storage::InMemoryBlockchainDb;
    use primitive_types::U256;
    use std::error::Error;

    fn database() -> BlockchainDatabase {
        BlockchainDatabase::new(Arc::new(InMemoryBlockchainDb::new()))
    }

    struct Fixture {
        explorer: Arc<MockExplorer>,
        keychain: Arc<Keychain>,
        synchronizer: AccountSynchronizer,
    }

    fn fixture() -> Fixture {
        let explorer = Arc::new(MockExplorer::new());
        let keychain = Arc::new(
            Keychain::new(
                Box::new(Blake2bAddressDeriver::new("xpub-test")),
                KeysDb::new(Box::new(MemoryPreferences::new())),
                5,
            )
            .unwrap(),
        );
        let stable = database();
        let unstable = database();
        let blocks = BlocksSynchronizer::new(
            explorer.clone(),
            keychain.clone(),
            stable.clone(),
            unstable.clone(),
            Arc::new(PendingPool::new()),
            SyncConfig::default().with_address_batch_size(5),
        )
        .unwrap();
        let synchronizer = AccountSynchronizer::new(explorer.clone(), blocks, stable, unstable);
        Fixture {
            explorer,
            keychain,
            synchronizer,
        }
    }

    fn receive_tx(hash: &str, address: &str, block: Option<BlockHeader>) -> crate::data_structures::Transaction {
        crate::data_structures::Transaction {
            hash: hash.to_string(),
            inputs: vec![],
            outputs: vec![crate::data_structures::TransactionOutput {
                index: 0,
                amount: U256::from(10u64),
                address: address.to_string(),
            }],
            fees: U256::zero(),
            block,
            received_at: 0,
        }
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait::async_trait]
    impl SyncEventListener for Recorder {
        async fn handle_event(
            &mut self,
            event: &SyncEvent,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            let name = match event {
                SyncEvent::Started { .. } => "started",
                SyncEvent::BatchApplied { .. } => "batch_applied",
                SyncEvent::Reorg { .. } => "reorg",
                SyncEvent::Completed { .. } => "completed",
                SyncEvent::Failed { .. } => "failed",
            };
            self.0
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(name.to_string());
            Ok(())
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn completed_pass_emits_events_and_records_checkpoint() {
        let f = fixture();
        let address = f.keychain.addresses(0, 1).unwrap().remove(0);
        f.explorer.set_tip(BlockHeader::new("h100", 100, 0));
        f.explorer.set_timestamp(1_700_000_000);
        f.explorer
            .add_transaction(receive_tx("t1", &address, Some(BlockHeader::new("h90", 90, 0))));

        let events = Arc::new(Mutex::new(Vec::new()));
        f.synchronizer
            .register_listener(Box::new(Recorder(events.clone())))
            .await;

        let report = f.synchronizer.synchronize().await.unwrap();
        assert_eq!(report.new_transactions, 1);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["started", "batch_applied", "completed"]
        );
        assert_eq!(
            f.synchronizer.last_synchronized(),
            Some(LastSynced {
                height: 100,
                timestamp: 1_700_000_000,
            })
        );
    }

    #[tokio::test]
    async fn resumes_from_the_newest_applied_block() {
        let f = fixture();
        let address = f.keychain.addresses(0, 1).unwrap().remove(0);
        f.explorer.set_tip(BlockHeader::new("h100", 100, 0));
        f.explorer
            .add_transaction(receive_tx("t1", &address, Some(BlockHeader::new("h97", 97, 0))));
        f.synchronizer.synchronize().await.unwrap();

        // The second pass resumes after h97 and sees only the newer block
        f.explorer
            .add_transaction(receive_tx("t2", &address, Some(BlockHeader::new("h99", 99, 0))));
        let report = f.synchronizer.synchronize().await.unwrap();
        assert_eq!(report.new_transactions, 1);
    }

    #[tokio::test]
    async fn failed_tip_resolution_emits_failed_event() {
        let f = fixture();
        f.explorer.set_failure_mode(MockFailureModes {
            fail_current_block: true,
            ..Default::default()
        });

        let events = Arc::new(Mutex::new(Vec::new()));
        f.synchronizer
            .register_listener(Box::new(Recorder(events.clone())))
            .await;

        let err = f.synchronizer.synchronize().await.unwrap_err();
        assert!(matches!(err, WalletError::ExplorerError(_)));
        assert_eq!(*events.lock().unwrap(), vec!["failed"]);
        assert_eq!(f.synchronizer.last_synchronized(), None);
    }

    #[tokio::test]
    async fn reorg_is_surfaced_as_an_event() {
        let f = fixture();
        let address = f.keychain.addresses(0, 1).unwrap().remove(0);
        f.explorer.set_tip(BlockHeader::new("h100", 100, 0));
        f.explorer
            .add_transaction(receive_tx("t1", &address, Some(BlockHeader::new("h98-a", 98, 0))));
        f.synchronizer.synchronize().await.unwrap();

        f.explorer.reorg_block(98, BlockHeader::new("h98-b", 98, 0));
        let events = Arc::new(Mutex::new(Vec::new()));
        f.synchronizer
            .register_listener(Box::new(Recorder(events.clone())))
            .await;
        f.synchronizer.synchronize().await.unwrap();

        let recorded = events.lock().unwrap().clone();
        assert!(recorded.contains(&"reorg".to_string()));
    }

    #[tokio::test]
    async fn empty_chain_synchronizes_from_genesis() {
        let f = fixture();
        f.explorer.set_tip(BlockHeader::new("h100", 100, 0));

        let report = f.synchronizer.synchronize().await.unwrap();
        assert_eq!(report.new_transactions, 0);
        assert_eq!(f.synchronizer.last_synchronized().unwrap().height, 100);
    }
}
