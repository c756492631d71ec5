//! Multi-currency wallet synchronization engine
//!
//! Keeps a wallet account's local view of a UTXO chain consistent with a
//! remote blockchain explorer. The engine derives watched addresses with a
//! gap-limit keychain, fetches matching transactions, splits confirmed blocks
//! across a stable and an unstable database around a configurable reorg
//! window, and aggregates spendable outputs from three prioritized sources
//! (stable, unstable, pending) into the balance and operation views host
//! applications consume.
//!
//! # Architecture
//!
//! - [`keychain`] derives addresses lazily and tracks the used-index
//!   watermark that drives gap-limit discovery
//! - [`storage`] persists filled blocks behind the byte-oriented
//!   [`BlockchainDb`] seam
//! - [`scanning`] runs synchronization passes against an [`Explorer`] and
//!   maintains the pending pool
//! - [`utxo`] folds the three UTXO sources into one spendable set
//! - [`services`] exposes balances and the operation history
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wallet_sync_engine::keychain::{Blake2bAddressDeriver, Keychain, KeysDb, MemoryPreferences};
//! use wallet_sync_engine::scanning::{AccountSynchronizer, BlocksSynchronizer, PendingPool, SyncConfig};
//! use wallet_sync_engine::storage::{BlockchainDatabase, InMemoryBlockchainDb};
//!
//! let keychain = Arc::new(Keychain::new(
//!     Box::new(Blake2bAddressDeriver::new(xpub)),
//!     KeysDb::new(Box::new(MemoryPreferences::new())),
//!     20,
//! )?);
//! let stable = BlockchainDatabase::new(Arc::new(InMemoryBlockchainDb::new()));
//! let unstable = BlockchainDatabase::new(Arc::new(InMemoryBlockchainDb::new()));
//! let blocks = BlocksSynchronizer::new(
//!     explorer.clone(),
//!     keychain,
//!     stable.clone(),
//!     unstable.clone(),
//!     Arc::new(PendingPool::new()),
//!     SyncConfig::default(),
//! )?;
//! let account = AccountSynchronizer::new(explorer, blocks, stable, unstable);
//! account.synchronize().await?;
//! ```

pub mod data_structures;
pub mod errors;
pub mod keychain;
pub mod scanning;
pub mod services;
pub mod storage;
pub mod utxo;

pub use data_structures::{
    BlockHeader, FilledBlock, Operation, OperationType, RawBlock, Transaction, TransactionInput,
    TransactionOutput, UtxoKey, UtxoSourceList, UtxoValue,
};
pub use errors::{KeychainError, SyncError, WalletError, WalletResult};
pub use keychain::{AddressDeriver, AddressSources, Keychain, KeysDb};
pub use scanning::{
    AccountSynchronizer, BlocksSynchronizer, Explorer, SyncConfig, SyncEvent, SyncEventListener,
    SyncReport, SyncState,
};
pub use services::{BalanceService, OperationFilter, OperationService};
pub use storage::{BlockchainDatabase, BlockchainDb, InMemoryBlockchainDb};
pub use utxo::{SourceBasedUtxoService, UtxoService, UtxoSource};
