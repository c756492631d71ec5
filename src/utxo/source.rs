//! UTXO source seam

use async_trait::async_trait;

use crate::data_structures::UtxoSourceList;
use crate::errors::WalletResult;

/// Produces the UTXO state of one overlapping view of the chain
///
/// Implementations may perform I/O (database scans, cache flushes). The
/// reported `height` must be monotonically non-decreasing over the source's
/// lifetime, and no key may appear in both `available` and `spent` of the
/// same list.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// Current available/spent view of this source
    async fn source_list(&self) -> WalletResult<UtxoSourceList>;
}
