//! Gap-limit keychain for one derivation branch
//!
//! Tracks which addresses of an account's derivation branch exist and which
//! have been observed in use. Derivation is lazy and bounded: an address past
//! `max_used_index + gap_limit` is never derived speculatively, which is the
//! BIP-44-style discovery contract the synchronizer relies on.
//!
//! The index map is mutex-guarded because `addresses` may race with
//! `mark_as_used` when a synchronization pass widens the watched window while
//! a query is in flight.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::errors::{KeychainError, WalletError, WalletResult};

use super::deriver::AddressDeriver;
use super::keys_db::KeysDb;

#[derive(Debug, Default)]
struct KeychainState {
    /// Every derived address, position == derivation index
    derived: Vec<String>,
    /// Reverse lookup from address to derivation index
    address_to_index: HashMap<String, u32>,
    /// Highest index observed in use; monotonically non-decreasing
    max_used_index: Option<u32>,
}

/// Address derivation and usage tracking for one account branch
pub struct Keychain {
    deriver: Box<dyn AddressDeriver>,
    keys_db: KeysDb,
    gap_limit: u32,
    state: Mutex<KeychainState>,
}

impl Keychain {
    /// Create a keychain, restoring previously persisted derivations and the
    /// used-index watermark from the keys database.
    pub fn new(
        deriver: Box<dyn AddressDeriver>,
        keys_db: KeysDb,
        gap_limit: u32,
    ) -> WalletResult<Self> {
        if gap_limit == 0 {
            return Err(WalletError::invalid_argument(
                "gap_limit",
                "must be at least 1",
            ));
        }

        let mut state = KeychainState::default();
        for (address, index) in keys_db.all_keys()? {
            if index as usize != state.derived.len() {
                return Err(KeychainError::KeysDbError(format!(
                    "non-contiguous persisted index {index}"
                ))
                .into());
            }
            state.address_to_index.insert(address.clone(), index);
            state.derived.push(address);
        }
        state.max_used_index = keys_db.max_used_index()?;

        Ok(Self {
            deriver,
            keys_db,
            gap_limit,
            state: Mutex::new(state),
        })
    }

    /// Number of addresses observed in use (`max_used_index + 1`, or zero)
    pub fn number_of_used_addresses(&self) -> u32 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.max_used_index.map(|i| i + 1).unwrap_or(0)
    }

    /// Return `count` addresses starting at `start_index`, deriving missing
    /// ones on demand.
    ///
    /// Every new derivation is persisted to the keys database before this
    /// method returns. Callers drive derivation exclusively through the
    /// batched discovery window (`AddressSources`), which is what keeps
    /// addresses past `max_used_index + gap_limit` from ever being derived
    /// speculatively.
    pub fn addresses(&self, start_index: u32, count: u32) -> WalletResult<Vec<String>> {
        let end = start_index as u64 + count as u64;
        if end > u32::MAX as u64 {
            return Err(KeychainError::IndexOverflow(end).into());
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        while (state.derived.len() as u64) < end {
            let index = state.derived.len() as u32;
            let address = self.deriver.derive(index)?;
            self.keys_db.add_key(&address, index)?;
            state.address_to_index.insert(address.clone(), index);
            state.derived.push(address);
        }

        Ok(state.derived[start_index as usize..end as usize].to_vec())
    }

    /// Mark an address as used.
    ///
    /// Idempotent; addresses not belonging to this keychain are ignored. The
    /// watermark only moves forward, and the new maximum is written durably
    /// before this method returns.
    pub fn mark_as_used(&self, address: &str) -> WalletResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let index = match state.address_to_index.get(address) {
            Some(index) => *index,
            None => return Ok(()),
        };

        let advances = match state.max_used_index {
            Some(current) => index > current,
            None => true,
        };
        if advances {
            self.keys_db.set_max_used_index(index)?;
            state.max_used_index = Some(index);
            debug!(index, "keychain used-index watermark advanced");
        }
        Ok(())
    }

    /// Derivation index of `address`, if it belongs to this keychain
    pub fn index_of(&self, address: &str) -> Option<u32> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.address_to_index.get(address).copied()
    }

    /// Whether `address` was derived by this keychain
    pub fn contains(&self, address: &str) -> bool {
        self.index_of(address).is_some()
    }

    /// Number of addresses derived so far
    pub fn number_of_derived_addresses(&self) -> u32 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.derived.len() as u32
    }

    /// The configured gap limit
    pub fn gap_limit(&self) -> u32 {
        self.gap_limit
    }
}
