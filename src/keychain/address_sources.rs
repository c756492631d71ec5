//! Batched watched-address window
//!
//! `AddressSources` materializes the keychain's addresses in fixed-size
//! batches. The synchronizer watches every batch; whenever the most recent
//! batch is observed in use, exactly one new batch is appended, so the
//! watched window always extends one batch past the last used batch. Batches
//! are never removed once created, which keeps already-derived addresses
//! observable forever.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::errors::{WalletError, WalletResult};

use super::keychain::Keychain;

/// Gap-limit discovery window over a keychain
pub struct AddressSources {
    keychain: Arc<Keychain>,
    batch_size: u32,
    batches: Mutex<Vec<Vec<String>>>,
}

impl std::fmt::Debug for AddressSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSources")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl AddressSources {
    /// Create the window with its initial batch derived from the keychain.
    ///
    /// `batch_size` must not exceed the keychain's gap limit, otherwise the
    /// initial batch could not be derived without violating the gap policy.
    pub fn new(keychain: Arc<Keychain>, batch_size: u32) -> WalletResult<Self> {
        if batch_size == 0 || batch_size > keychain.gap_limit() {
            return Err(WalletError::invalid_argument(
                "batch_size",
                &format!(
                    "must be between 1 and the keychain gap limit ({})",
                    keychain.gap_limit()
                ),
            ));
        }
        let first_batch = keychain.addresses(0, batch_size)?;
        Ok(Self {
            keychain,
            batch_size,
            batches: Mutex::new(vec![first_batch]),
        })
    }

    /// Number of batches currently watched
    pub fn number_of_batches(&self) -> u32 {
        let batches = self.batches.lock().unwrap_or_else(|e| e.into_inner());
        batches.len() as u32
    }

    /// Addresses of one batch, empty when the index is out of range
    pub fn batch(&self, batch_index: u32) -> Vec<String> {
        let batches = self.batches.lock().unwrap_or_else(|e| e.into_inner());
        batches
            .get(batch_index as usize)
            .cloned()
            .unwrap_or_default()
    }

    /// Every watched address, in derivation order
    pub fn all_addresses(&self) -> Vec<String> {
        let batches = self.batches.lock().unwrap_or_else(|e| e.into_inner());
        batches.iter().flatten().cloned().collect()
    }

    /// Batch index covering the given derivation index
    pub fn batch_index_for(&self, derivation_index: u32) -> u32 {
        derivation_index / self.batch_size
    }

    /// Mark a batch as used.
    ///
    /// Appends the next batch only when `batch_index` is the most recently
    /// added one; marking an earlier batch changes nothing, which is exactly
    /// the gap-limit invariant. Returns whether the window grew.
    pub fn mark_batch_as_used(&self, batch_index: u32) -> WalletResult<bool> {
        let mut batches = self.batches.lock().unwrap_or_else(|e| e.into_inner());
        if batch_index as usize + 1 != batches.len() {
            return Ok(false);
        }

        let start = batches.len() as u32 * self.batch_size;
        let next_batch = self.keychain.addresses(start, self.batch_size)?;
        batches.push(next_batch);
        debug!(
            batches = batches.len(),
            "watched-address window extended by one batch"
        );
        Ok(true)
    }
}
