//! UTXO sources and aggregation
//!
//! Each `UtxoSource` reports the outputs it believes are available or spent
//! as of some height; the source-based service merges the pending, unstable,
//! and stable views into one coherent UTXO set with deterministic conflict
//! resolution. The aggregate is recomputed on every call, which is what makes
//! reorg recovery correct.

pub mod database_source;
pub mod memory_source;
pub mod persistent_source;
pub mod service;
pub mod source;

pub use database_source::DatabaseUtxoSource;
pub use memory_source::InMemoryUtxoSource;
pub use persistent_source::PersistentUtxoSource;
pub use service::{SourceBasedUtxoService, UtxoService};
pub use source::UtxoSource;
