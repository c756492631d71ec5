//! Core value types for the wallet synchronization engine
//!
//! These are the immutable building blocks shared by every layer: UTXO
//! identification and amounts, block headers and filled blocks, and the
//! reconstructed operation view surfaced to host applications.

pub mod block;
pub mod operation;
pub mod utxo;

pub use block::{
    BlockHeader, FilledBlock, RawBlock, Transaction, TransactionInput, TransactionOutput,
};
pub use operation::{Operation, OperationType};
pub use utxo::{UtxoKey, UtxoSourceList, UtxoValue};
