//! Block headers, transactions, and the filled-block persistence unit
//!
//! `FilledBlock` is the atomic unit of synchronization: a header plus the
//! ordered transactions discovered for it. It round-trips through `RawBlock`
//! (opaque borsh bytes) at the persistence boundary, so the byte-oriented
//! `BlockchainDb` backends never need to understand the domain model.

use borsh::{BorshDeserialize, BorshSerialize};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};

use super::utxo::u256_borsh;

/// Opaque serialized form of a filled block, as stored by `BlockchainDb`
pub type RawBlock = Vec<u8>;

/// Block header
///
/// `height` is the canonical ordering key; `hash` is the content identity.
/// Immutable once persisted to the stable database; may be replaced in the
/// unstable database during a reorganization.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct BlockHeader {
    /// Block hash as reported by the explorer
    pub hash: String,
    /// Block height
    pub height: u32,
    /// Unix timestamp the block was created at
    pub created_at: u64,
}

impl BlockHeader {
    /// Create a new block header
    pub fn new(hash: impl Into<String>, height: u32, created_at: u64) -> Self {
        Self {
            hash: hash.into(),
            height,
            created_at,
        }
    }

    /// Genesis placeholder used when a database is empty and the caller did
    /// not supply its own starting point
    pub fn genesis() -> Self {
        Self {
            hash: String::new(),
            height: 0,
            created_at: 0,
        }
    }
}

/// One spent input of a transaction
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct TransactionInput {
    /// Hash of the transaction that created the consumed output
    pub previous_tx_hash: String,
    /// Index of the consumed output within that transaction
    pub previous_output_index: u32,
    /// Address the consumed output belonged to, when the explorer reports it
    pub address: Option<String>,
    /// Amount of the consumed output, when the explorer reports it
    #[borsh(
        serialize_with = "borsh_option_u256::serialize",
        deserialize_with = "borsh_option_u256::deserialize"
    )]
    pub amount: Option<U256>,
}

/// One created output of a transaction
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct TransactionOutput {
    /// Index of the output within its transaction
    pub index: u32,
    /// Output amount in the chain's smallest unit
    #[borsh(
        serialize_with = "u256_borsh::serialize",
        deserialize_with = "u256_borsh::deserialize"
    )]
    pub amount: U256,
    /// Receiving address
    pub address: String,
}

/// A transaction as observed from the explorer
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct Transaction {
    /// Transaction hash
    pub hash: String,
    /// Spent inputs
    pub inputs: Vec<TransactionInput>,
    /// Created outputs
    pub outputs: Vec<TransactionOutput>,
    /// Fees paid by the transaction
    #[borsh(
        serialize_with = "u256_borsh::serialize",
        deserialize_with = "u256_borsh::deserialize"
    )]
    pub fees: U256,
    /// Containing block, absent while the transaction is unconfirmed
    pub block: Option<BlockHeader>,
    /// Unix timestamp the transaction was first observed
    pub received_at: u64,
}

impl Transaction {
    /// Whether the transaction has been mined into a block
    pub fn is_confirmed(&self) -> bool {
        self.block.is_some()
    }
}

/// A block header together with the ordered transactions discovered for it
///
/// Created and replaced atomically during synchronization; a partially
/// written filled block is never observable through the database layer.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct FilledBlock {
    /// Block header
    pub header: BlockHeader,
    /// Transactions relevant to the account, in explorer order
    pub transactions: Vec<Transaction>,
}

impl FilledBlock {
    /// Create a new filled block
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Serialize to the opaque persistence form
    pub fn to_raw(&self) -> WalletResult<RawBlock> {
        borsh::to_vec(self).map_err(|e| WalletError::SerializationError(e.to_string()))
    }

    /// Deserialize from the opaque persistence form
    pub fn from_raw(raw: &RawBlock) -> WalletResult<Self> {
        borsh::from_slice(raw).map_err(|e| WalletError::SerializationError(e.to_string()))
    }
}

/// Borsh helpers for `Option<U256>` fields
mod borsh_option_u256 {
    use borsh::io::{Read, Result, Write};
    use borsh::{BorshDeserialize, BorshSerialize};
    use primitive_types::U256;

    use super::u256_borsh;

    pub fn serialize<W: Write>(value: &Option<U256>, writer: &mut W) -> Result<()> {
        match value {
            Some(v) => {
                1u8.serialize(writer)?;
                u256_borsh::serialize(v, writer)
            }
            None => 0u8.serialize(writer),
        }
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Option<U256>> {
        let tag = u8::deserialize_reader(reader)?;
        if tag == 0 {
            Ok(None)
        } else {
            Ok(Some(u256_borsh::deserialize(reader)?))
        }
    }
}
