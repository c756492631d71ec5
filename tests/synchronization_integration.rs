//! End-to-end synchronization tests over the full engine stack: mock
//! explorer, gap-limit keychain, stable and unstable databases, three-source
//! UTXO aggregation, and the derived balance and operation views.

use std::sync::Arc;

use primitive_types::U256;

use wallet_sync_engine::data_structures::{
    BlockHeader, Transaction, TransactionInput, TransactionOutput,
};
use wallet_sync_engine::keychain::{Blake2bAddressDeriver, Keychain, KeysDb, MemoryPreferences};
use wallet_sync_engine::scanning::{
    AccountSynchronizer, BlocksSynchronizer, MockExplorer, PendingPool, SyncConfig,
};
use wallet_sync_engine::services::{BalanceService, OperationFilter, OperationService};
use wallet_sync_engine::storage::{BlockchainDatabase, InMemoryBlockchainDb};
use wallet_sync_engine::utxo::{DatabaseUtxoSource, SourceBasedUtxoService};
use wallet_sync_engine::OperationType;

struct Engine {
    explorer: Arc<MockExplorer>,
    keychain: Arc<Keychain>,
    synchronizer: AccountSynchronizer,
    balance: BalanceService,
    operations: OperationService,
}

fn engine() -> Engine {
    let explorer = Arc::new(MockExplorer::new());
    let keychain = Arc::new(
        Keychain::new(
            Box::new(Blake2bAddressDeriver::new("xpub-integration")),
            KeysDb::new(Box::new(MemoryPreferences::new())),
            5,
        )
        .unwrap(),
    );
    let stable = BlockchainDatabase::new(Arc::new(InMemoryBlockchainDb::new()));
    let unstable = BlockchainDatabase::new(Arc::new(InMemoryBlockchainDb::new()));
    let pending_pool = Arc::new(PendingPool::new());

    let blocks = BlocksSynchronizer::new(
        explorer.clone(),
        keychain.clone(),
        stable.clone(),
        unstable.clone(),
        pending_pool.clone(),
        SyncConfig::default().with_address_batch_size(5),
    )
    .unwrap();
    let synchronizer =
        AccountSynchronizer::new(explorer.clone(), blocks, stable.clone(), unstable.clone());

    let utxo_service = Arc::new(SourceBasedUtxoService::new(
        pending_pool.utxo_source(),
        Arc::new(DatabaseUtxoSource::new(unstable.clone(), keychain.clone())),
        Arc::new(DatabaseUtxoSource::new(stable.clone(), keychain.clone())),
    ));
    let balance = BalanceService::new(utxo_service);
    let operations = OperationService::new(stable, unstable, pending_pool, keychain.clone());

    Engine {
        explorer,
        keychain,
        synchronizer,
        balance,
        operations,
    }
}

fn receive(hash: &str, to: &str, amount: u64, block: Option<BlockHeader>) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        inputs: vec![],
        outputs: vec![TransactionOutput {
            index: 0,
            amount: U256::from(amount),
            address: to.to_string(),
        }],
        fees: U256::zero(),
        block,
        received_at: 0,
    }
}

fn spend(
    hash: &str,
    from: (&str, u32, &str, u64),
    to: &str,
    amount: u64,
    fees: u64,
    block: BlockHeader,
) -> Transaction {
    let (prev_hash, prev_index, owner, prev_amount) = from;
    Transaction {
        hash: hash.to_string(),
        inputs: vec![TransactionInput {
            previous_tx_hash: prev_hash.to_string(),
            previous_output_index: prev_index,
            address: Some(owner.to_string()),
            amount: Some(U256::from(prev_amount)),
        }],
        outputs: vec![TransactionOutput {
            index: 0,
            amount: U256::from(amount),
            address: to.to_string(),
        }],
        fees: U256::from(fees),
        block: Some(block),
        received_at: 0,
    }
}

#[tokio::test]
async fn received_funds_flow_into_balance_and_history() {
    let e = engine();
    let owned = e.keychain.addresses(0, 1).unwrap().remove(0);
    e.explorer.set_tip(BlockHeader::new("h100", 100, 0));
    // Stable receive plus an unconfirmed one
    e.explorer
        .add_transaction(receive("t1", &owned, 10, Some(BlockHeader::new("h90", 90, 0))));
    e.explorer.add_transaction(receive("t2", &owned, 5, None));

    let report = e.synchronizer.synchronize().await.unwrap();
    assert_eq!(report.new_transactions, 2);
    assert_eq!(report.pending_transactions, 1);

    assert_eq!(e.balance.get_balance().await.unwrap(), U256::from(15u64));

    let ops = e.operations.operations(&OperationFilter::new()).await.unwrap();
    assert_eq!(ops.len(), 2);
    assert!(ops.iter().all(|op| op.operation_type == OperationType::Receive));

    // The trusted view excludes the unconfirmed receive
    let trusted = e
        .operations
        .operations(&OperationFilter::new().stable_only())
        .await
        .unwrap();
    assert_eq!(trusted.len(), 1);
    assert_eq!(trusted[0].tx_hash, "t1");
}

#[tokio::test]
async fn spend_in_unstable_block_overrides_stable_output() {
    let e = engine();
    let owned = e.keychain.addresses(0, 1).unwrap().remove(0);
    e.explorer.set_tip(BlockHeader::new("h100", 100, 0));
    e.explorer
        .add_transaction(receive("t1", &owned, 10, Some(BlockHeader::new("h90", 90, 0))));
    e.explorer.add_transaction(spend(
        "t2",
        ("t1", 0, &owned, 10),
        "payee",
        7,
        3,
        BlockHeader::new("h98", 98, 0),
    ));

    e.synchronizer.synchronize().await.unwrap();

    // The stable output is consumed by the unstable spend
    assert_eq!(e.balance.get_balance().await.unwrap(), U256::zero());

    let ops = e.operations.operations(&OperationFilter::new()).await.unwrap();
    let send = ops
        .iter()
        .find(|op| op.operation_type == OperationType::Send)
        .unwrap();
    assert_eq!(send.amount, U256::from(7u64));
    assert_eq!(send.fees, U256::from(3u64));
    assert_eq!(send.recipients, vec!["payee".to_string()]);
}

#[tokio::test]
async fn reorg_evicting_a_spend_restores_the_balance() {
    let e = engine();
    let owned = e.keychain.addresses(0, 2).unwrap();
    e.explorer.set_tip(BlockHeader::new("h100", 100, 0));
    e.explorer
        .add_transaction(receive("t1", &owned[0], 10, Some(BlockHeader::new("h90", 90, 0))));
    e.explorer.add_transaction(spend(
        "t2",
        ("t1", 0, &owned[0], 10),
        "payee",
        7,
        3,
        BlockHeader::new("h98-a", 98, 0),
    ));
    e.synchronizer.synchronize().await.unwrap();
    assert_eq!(e.balance.get_balance().await.unwrap(), U256::zero());

    // The spending block is orphaned; its replacement pays us instead
    e.explorer.remove_transaction("t2");
    e.explorer
        .add_transaction(receive("t3", &owned[1], 3, Some(BlockHeader::new("h98-b", 98, 0))));
    let report = e.synchronizer.synchronize().await.unwrap();

    assert_eq!(report.reorgs.len(), 1);
    assert_eq!(report.reorgs[0].old_hash, "h98-a");
    assert_eq!(report.reorgs[0].new_hash, "h98-b");
    // The evicted spend no longer consumes t1:0
    assert_eq!(e.balance.get_balance().await.unwrap(), U256::from(13u64));
}

#[tokio::test]
async fn discovery_reaches_addresses_beyond_the_initial_window() {
    let e = engine();
    // Index 7 sits in the second batch, invisible until usage of the first
    // batch widens the window
    e.explorer.set_tip(BlockHeader::new("h100", 100, 0));
    let first = e.keychain.addresses(0, 5).unwrap();
    e.explorer
        .add_transaction(receive("t1", &first[4], 10, Some(BlockHeader::new("h90", 90, 0))));

    // Derive ahead only to learn the future address for staging; a fresh
    // keychain with the same xpub yields the same derivations
    let probe = Keychain::new(
        Box::new(Blake2bAddressDeriver::new("xpub-integration")),
        KeysDb::new(Box::new(MemoryPreferences::new())),
        20,
    )
    .unwrap();
    let future = probe.addresses(7, 1).unwrap().remove(0);
    e.explorer
        .add_transaction(receive("t2", &future, 4, Some(BlockHeader::new("h91", 91, 0))));

    let report = e.synchronizer.synchronize().await.unwrap();
    assert_eq!(report.new_transactions, 2);
    assert_eq!(e.keychain.number_of_used_addresses(), 8);
    assert_eq!(e.balance.get_balance().await.unwrap(), U256::from(14u64));
}

#[tokio::test]
async fn repeated_passes_are_idempotent() {
    let e = engine();
    let owned = e.keychain.addresses(0, 1).unwrap().remove(0);
    e.explorer.set_tip(BlockHeader::new("h100", 100, 0));
    e.explorer
        .add_transaction(receive("t1", &owned, 10, Some(BlockHeader::new("h90", 90, 0))));

    e.synchronizer.synchronize().await.unwrap();
    e.synchronizer.synchronize().await.unwrap();
    e.synchronizer.synchronize().await.unwrap();

    assert_eq!(e.balance.get_balance().await.unwrap(), U256::from(10u64));
    let ops = e.operations.operations(&OperationFilter::new()).await.unwrap();
    assert_eq!(ops.len(), 1);
}
