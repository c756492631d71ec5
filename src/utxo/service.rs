//! Source-based UTXO aggregation
//!
//! Merges exactly three sources in fixed priority order: pending
//! (unconfirmed) over unstable (recent blocks) over stable (confirmed
//! history). The fold runs lowest to highest priority:
//!
//! 1. an output available in a higher-priority source overrides the same
//!    key's entry from a lower-priority source;
//! 2. a key spent in any source is removed from the aggregate unless a
//!    strictly higher-priority source re-adds it as available (an output
//!    spent in a since-evicted unstable block becomes available again);
//! 3. the aggregate is `available − spent`.
//!
//! The result is never cached: every call re-derives from the sources'
//! current state, which is what keeps the view correct across reorgs. If any
//! source fetch fails the whole aggregation fails, since a partial aggregate
//! is unsound.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::data_structures::{UtxoKey, UtxoSourceList, UtxoValue};
use crate::errors::WalletResult;

use super::source::UtxoSource;

/// Aggregated UTXO view of an account
#[async_trait]
pub trait UtxoService: Send + Sync {
    /// The current coherent UTXO set, keyed by `UtxoKey`
    async fn get_utxos(&self) -> WalletResult<BTreeMap<UtxoKey, UtxoValue>>;
}

/// `UtxoService` built from the three-source priority merge
pub struct SourceBasedUtxoService {
    pending: Arc<dyn UtxoSource>,
    unstable: Arc<dyn UtxoSource>,
    stable: Arc<dyn UtxoSource>,
}

impl SourceBasedUtxoService {
    /// Create the service from its three sources, highest priority first
    pub fn new(
        pending: Arc<dyn UtxoSource>,
        unstable: Arc<dyn UtxoSource>,
        stable: Arc<dyn UtxoSource>,
    ) -> Self {
        Self {
            pending,
            unstable,
            stable,
        }
    }

    /// Fold source lists given lowest priority first
    fn aggregate(lists: &[UtxoSourceList]) -> BTreeMap<UtxoKey, UtxoValue> {
        let mut available: BTreeMap<UtxoKey, UtxoValue> = BTreeMap::new();
        let mut spent: BTreeSet<UtxoKey> = BTreeSet::new();

        for list in lists {
            for (key, value) in &list.available {
                // Availability at this priority overrides spends recorded by
                // lower-priority sources
                spent.remove(key);
                available.insert(key.clone(), value.clone());
            }
            for key in &list.spent {
                spent.insert(key.clone());
            }
        }

        for key in &spent {
            available.remove(key);
        }
        available
    }
}

#[async_trait]
impl UtxoService for SourceBasedUtxoService {
    async fn get_utxos(&self) -> WalletResult<BTreeMap<UtxoKey, UtxoValue>> {
        let stable = self.stable.source_list().await?;
        let unstable = self.unstable.source_list().await?;
        let pending = self.pending.source_list().await?;
        Ok(Self::aggregate(&[stable, unstable, pending]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo::memory_source::InMemoryUtxoSource;
    use primitive_types::U256;

    fn key(tag: &str) -> UtxoKey {
        UtxoKey::new(tag, 0)
    }

    fn value(amount: u64) -> UtxoValue {
        UtxoValue::new(U256::from(amount), "addr")
    }

    fn service(
        pending: UtxoSourceList,
        unstable: UtxoSourceList,
        stable: UtxoSourceList,
    ) -> SourceBasedUtxoService {
        let pending_source = Arc::new(InMemoryUtxoSource::new());
        pending_source.replace(pending);
        let unstable_source = Arc::new(InMemoryUtxoSource::new());
        unstable_source.replace(unstable);
        let stable_source = Arc::new(InMemoryUtxoSource::new());
        stable_source.replace(stable);
        SourceBasedUtxoService::new(pending_source, unstable_source, stable_source)
    }

    #[tokio::test]
    async fn pending_spend_overrides_stable_availability() {
        let mut stable = UtxoSourceList::empty_at(90);
        stable.add_available(key("tx1"), value(10));
        let mut pending = UtxoSourceList::empty_at(100);
        pending.add_spent(key("tx1"));

        let service = service(pending, UtxoSourceList::empty_at(100), stable);
        let utxos = service.get_utxos().await.unwrap();
        assert!(utxos.is_empty());
    }

    #[tokio::test]
    async fn pending_availability_overrides_stable_spend() {
        let mut stable = UtxoSourceList::empty_at(90);
        stable.add_spent(key("tx1"));
        let mut pending = UtxoSourceList::empty_at(100);
        pending.add_available(key("tx1"), value(10));

        let service = service(pending, UtxoSourceList::empty_at(100), stable);
        let utxos = service.get_utxos().await.unwrap();
        assert_eq!(utxos.get(&key("tx1")), Some(&value(10)));
    }

    #[tokio::test]
    async fn lower_priority_availability_does_not_resurrect_spent_key() {
        // Spent at unstable priority, available only below it
        let mut stable = UtxoSourceList::empty_at(90);
        stable.add_available(key("tx1"), value(10));
        let mut unstable = UtxoSourceList::empty_at(100);
        unstable.add_spent(key("tx1"));

        let service = service(UtxoSourceList::empty_at(100), unstable, stable);
        let utxos = service.get_utxos().await.unwrap();
        assert!(utxos.is_empty());
    }

    #[tokio::test]
    async fn higher_priority_value_wins_for_same_key() {
        let mut stable = UtxoSourceList::empty_at(90);
        stable.add_available(key("tx1"), value(10));
        let mut unstable = UtxoSourceList::empty_at(100);
        unstable.add_available(key("tx1"), value(12));

        let service = service(UtxoSourceList::empty_at(100), unstable, stable);
        let utxos = service.get_utxos().await.unwrap();
        assert_eq!(utxos.get(&key("tx1")), Some(&value(12)));
    }

    #[tokio::test]
    async fn aggregation_is_idempotent_without_source_changes() {
        let mut stable = UtxoSourceList::empty_at(90);
        stable.add_available(key("tx1"), value(10));
        stable.add_available(key("tx2"), value(5));
        let mut pending = UtxoSourceList::empty_at(100);
        pending.add_spent(key("tx2"));

        let service = service(pending, UtxoSourceList::empty_at(100), stable);
        let first = service.get_utxos().await.unwrap();
        let second = service.get_utxos().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn disjoint_sources_union_cleanly() {
        let mut stable = UtxoSourceList::empty_at(90);
        stable.add_available(key("tx1"), value(10));
        let mut unstable = UtxoSourceList::empty_at(100);
        unstable.add_available(key("tx2"), value(5));
        let mut pending = UtxoSourceList::empty_at(100);
        pending.add_available(key("tx3"), value(2));

        let service = service(pending, unstable, stable);
        let utxos = service.get_utxos().await.unwrap();
        assert_eq!(utxos.len(), 3);
    }

    #[tokio::test]
    async fn source_failure_fails_whole_aggregation() {
        struct FailingSource;
        #[async_trait]
        impl UtxoSource for FailingSource {
            async fn source_list(&self) -> WalletResult<UtxoSourceList> {
                Err(crate::errors::WalletError::StorageError(
                    "backing store unavailable".to_string(),
                ))
            }
        }

        let pending = Arc::new(InMemoryUtxoSource::new());
        let mut list = UtxoSourceList::empty_at(100);
        list.add_available(key("tx1"), value(10));
        pending.replace(list);

        let service = SourceBasedUtxoService::new(
            pending,
            Arc::new(FailingSource),
            Arc::new(InMemoryUtxoSource::new()),
        );
        assert!(service.get_utxos().await.is_err());
    }
}
