//! UTXO identification and per-source state
//!
//! A `UtxoKey` uniquely identifies a spendable output by its originating
//! transaction hash and output index. A `UtxoValue` carries the observed
//! amount and owning address. A `UtxoSourceList` is the UTXO state as
//! understood by a single source (pending pool, unstable chain, stable chain)
//! as of a given block height; cross-source conflicts are resolved by the
//! aggregation in `utxo::service`.

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Borsh helpers for `U256` fields (32-byte big-endian encoding)
pub mod u256_borsh {
    use borsh::io::{Read, Result, Write};
    use primitive_types::U256;

    /// Serialize a `U256` as 32 big-endian bytes
    pub fn serialize<W: Write>(value: &U256, writer: &mut W) -> Result<()> {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        writer.write_all(&buf)
    }

    /// Deserialize a `U256` from 32 big-endian bytes
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<U256> {
        let mut buf = [0u8; 32];
        reader.read_exact(&mut buf)?;
        Ok(U256::from_big_endian(&buf))
    }
}

/// Unique identifier of a transaction output
///
/// Equality and ordering are structural, so the key can be used directly in
/// `BTreeMap`/`BTreeSet` collections across the aggregation pipeline.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct UtxoKey {
    /// Hash of the transaction that created the output
    pub tx_hash: String,
    /// Index of the output within that transaction
    pub output_index: u32,
}

impl UtxoKey {
    /// Create a new UTXO key
    pub fn new(tx_hash: impl Into<String>, output_index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            output_index,
        }
    }
}

impl std::fmt::Display for UtxoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.output_index)
    }
}

/// Observed value of a transaction output
///
/// Constructed once when the output is observed in a transaction and never
/// mutated afterwards (replaced, not edited).
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct UtxoValue {
    /// Output amount in the chain's smallest unit
    #[borsh(
        serialize_with = "u256_borsh::serialize",
        deserialize_with = "u256_borsh::deserialize"
    )]
    pub amount: U256,
    /// Address that owns the output
    pub address: String,
}

impl UtxoValue {
    /// Create a new UTXO value
    pub fn new(amount: U256, address: impl Into<String>) -> Self {
        Self {
            amount,
            address: address.into(),
        }
    }
}

/// UTXO state as understood by a single source as of `height`
///
/// Invariant: a key present in `spent` is never simultaneously present in
/// `available` within the same list. `height` is monotonically non-decreasing
/// over a source's lifetime.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct UtxoSourceList {
    /// Outputs this source currently considers spendable
    pub available: BTreeMap<UtxoKey, UtxoValue>,
    /// Outputs this source has observed being spent
    pub spent: BTreeSet<UtxoKey>,
    /// Block height this view corresponds to
    pub height: u32,
}

impl UtxoSourceList {
    /// Create an empty source list at the given height
    pub fn empty_at(height: u32) -> Self {
        Self {
            available: BTreeMap::new(),
            spent: BTreeSet::new(),
            height,
        }
    }

    /// Record an output as available, clearing any earlier spend record so the
    /// per-list invariant holds
    pub fn add_available(&mut self, key: UtxoKey, value: UtxoValue) {
        self.spent.remove(&key);
        self.available.insert(key, value);
    }

    /// Record an output as spent, removing it from availability if this source
    /// also created it
    pub fn add_spent(&mut self, key: UtxoKey) {
        self.available.remove(&key);
        self.spent.insert(key);
    }

    /// Whether the list carries no information
    pub fn is_empty(&self) -> bool {
        self.available.is_empty() && self.spent.is_empty()
    }
}
