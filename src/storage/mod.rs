//! Block persistence
//!
//! Two layers: the byte-oriented `BlockchainDb` trait stores `RawBlock`
//! payloads keyed by height (in-memory backend included; disk backends plug
//! in behind the same trait), and the domain-level `BlockchainDatabase`
//! serializes `FilledBlock`s across that boundary and implements the
//! stable/unstable range-query and pruning semantics.

pub mod blockchain_database;
pub mod blockchain_db;
pub mod memory;

pub use blockchain_database::BlockchainDatabase;
pub use blockchain_db::BlockchainDb;
pub use memory::InMemoryBlockchainDb;
