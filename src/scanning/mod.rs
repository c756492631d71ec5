//! Account synchronization
//!
//! The synchronization pipeline for one account: the [`Explorer`] trait is
//! the remote seam, [`BlocksSynchronizer`] fetches and applies blocks around
//! the reorg window, and [`AccountSynchronizer`] drives whole passes while
//! emitting progress events. [`MockExplorer`] serves scripted chains for
//! tests.

pub mod account_synchronizer;
pub mod blocks_synchronizer;
pub mod config;
pub mod events;
pub mod explorer;
pub mod mocks;
pub mod pending_pool;

pub use account_synchronizer::{AccountSynchronizer, LastSynced};
pub use blocks_synchronizer::{BlocksSynchronizer, ReorgRecord, SyncReport, SyncState};
pub use config::SyncConfig;
pub use events::{SyncEvent, SyncEventDispatcher, SyncEventListener};
pub use explorer::{Explorer, TransactionBulk};
pub use mocks::{MockCallCounts, MockExplorer, MockFailureModes};
pub use pending_pool::PendingPool;
