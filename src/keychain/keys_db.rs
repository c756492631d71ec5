//! Durable keychain state over a preferences/KV store
//!
//! `KeysDb` records every derived address with its index plus the highest
//! index known to be used, so a keychain can be rebuilt after restart without
//! re-deriving or losing observability of already-watched addresses. The
//! backing `Preferences` trait is the persistence seam; the in-memory
//! implementation backs tests and volatile accounts.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::{KeychainError, WalletResult};

const KEY_PREFIX: &str = "key:";
const MAX_USED_INDEX_KEY: &str = "max_used_index";

/// Minimal durable key/value store seam
///
/// Writes must be visible to subsequent reads once the call returns; that is
/// what lets the keychain persist a derivation before handing the address to
/// callers.
pub trait Preferences: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> WalletResult<Option<Vec<u8>>>;
    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &[u8]) -> WalletResult<()>;
    /// All entries whose key starts with `prefix`
    fn entries_with_prefix(&self, prefix: &str) -> WalletResult<Vec<(String, Vec<u8>)>>;
}

/// Mutex-guarded in-memory preferences store
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryPreferences {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> WalletResult<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> WalletResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn entries_with_prefix(&self, prefix: &str) -> WalletResult<Vec<(String, Vec<u8>)>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Keychain persistence facade over a `Preferences` store
pub struct KeysDb {
    preferences: Box<dyn Preferences>,
}

impl KeysDb {
    /// Create a keys database over the given preferences backend
    pub fn new(preferences: Box<dyn Preferences>) -> Self {
        Self { preferences }
    }

    /// Persist one derived address with its index
    pub fn add_key(&self, address: &str, index: u32) -> WalletResult<()> {
        self.preferences
            .set(&format!("{KEY_PREFIX}{address}"), &index.to_le_bytes())
    }

    /// All persisted addresses with their indexes, ascending by index
    pub fn all_keys(&self) -> WalletResult<Vec<(String, u32)>> {
        let mut keys = Vec::new();
        for (key, value) in self.preferences.entries_with_prefix(KEY_PREFIX)? {
            let address = key[KEY_PREFIX.len()..].to_string();
            let bytes: [u8; 4] = value.as_slice().try_into().map_err(|_| {
                KeychainError::KeysDbError(format!("corrupt index entry for {address}"))
            })?;
            keys.push((address, u32::from_le_bytes(bytes)));
        }
        keys.sort_by_key(|(_, index)| *index);
        Ok(keys)
    }

    /// Persist the highest index known to be used
    pub fn set_max_used_index(&self, index: u32) -> WalletResult<()> {
        self.preferences
            .set(MAX_USED_INDEX_KEY, &index.to_le_bytes())
    }

    /// The highest index known to be used, if any address was ever marked
    pub fn max_used_index(&self) -> WalletResult<Option<u32>> {
        match self.preferences.get(MAX_USED_INDEX_KEY)? {
            Some(value) => {
                let bytes: [u8; 4] = value.as_slice().try_into().map_err(|_| {
                    KeychainError::KeysDbError("corrupt max_used_index entry".to_string())
                })?;
                Ok(Some(u32::from_le_bytes(bytes)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_db() -> KeysDb {
        KeysDb::new(Box::new(MemoryPreferences::new()))
    }

    #[test]
    fn stored_keys_come_back_sorted_by_index() {
        let db = keys_db();
        db.add_key("addr2", 2).unwrap();
        db.add_key("addr0", 0).unwrap();
        db.add_key("addr1", 1).unwrap();

        let keys = db.all_keys().unwrap();
        assert_eq!(
            keys,
            vec![
                ("addr0".to_string(), 0),
                ("addr1".to_string(), 1),
                ("addr2".to_string(), 2),
            ]
        );
    }

    #[test]
    fn max_used_index_is_absent_until_set() {
        let db = keys_db();
        assert_eq!(db.max_used_index().unwrap(), None);
        db.set_max_used_index(5).unwrap();
        assert_eq!(db.max_used_index().unwrap(), Some(5));
    }

    #[test]
    fn corrupt_index_entry_is_reported() {
        let preferences = MemoryPreferences::new();
        preferences.set("key:bad", &[1, 2]).unwrap();
        let db = KeysDb::new(Box::new(preferences));
        assert!(db.all_keys().is_err());
    }
}
