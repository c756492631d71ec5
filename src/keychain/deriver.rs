//! Address derivation seam
//!
//! Per-currency address and script encoding is an external collaborator: the
//! engine only needs a deterministic `index -> address` function for one
//! derivation branch. Implementations receive the account's extended public
//! key at construction time rather than through inheritance, so one deriver
//! type can serve any chain parameterization.

use blake2::{Blake2b, Digest};
use digest::consts::U20;

use crate::errors::{KeychainError, WalletResult};

/// Derives the address at a given index of one derivation branch
pub trait AddressDeriver: Send + Sync {
    /// Derive the address at `index`.
    ///
    /// Must be deterministic: the same index always yields the same address.
    fn derive(&self, index: u32) -> WalletResult<String>;
}

/// Deterministic deriver backed by Blake2b over the extended public key.
///
/// Stands in for real per-currency encoders in tests and demos: it produces
/// stable base58 strings with the shape of wallet addresses without touching
/// any chain-specific cryptography.
#[derive(Debug, Clone)]
pub struct Blake2bAddressDeriver {
    extended_public_key: String,
}

impl Blake2bAddressDeriver {
    /// Create a deriver for the given extended public key
    pub fn new(extended_public_key: impl Into<String>) -> Self {
        Self {
            extended_public_key: extended_public_key.into(),
        }
    }
}

impl AddressDeriver for Blake2bAddressDeriver {
    fn derive(&self, index: u32) -> WalletResult<String> {
        let mut hasher = Blake2b::<U20>::new();
        hasher.update(self.extended_public_key.as_bytes());
        hasher.update(index.to_le_bytes());
        let digest = hasher.finalize();
        let encoded = bs58::encode(digest.as_slice()).into_string();
        if encoded.is_empty() {
            return Err(KeychainError::DerivationFailed {
                index,
                message: "empty encoding".to_string(),
            }
            .into());
        }
        Ok(encoded)
    }
}
