//! Balance projection over the aggregated UTXO set

use std::sync::Arc;

use primitive_types::U256;

use crate::errors::WalletResult;
use crate::utxo::UtxoService;

/// Computes the account balance from the UTXO service
///
/// Pure projection: the balance is always the sum of the current aggregate,
/// never incrementally maintained, so it cannot drift from the UTXO view.
pub struct BalanceService {
    utxo_service: Arc<dyn UtxoService>,
}

impl BalanceService {
    /// Create a balance service over the given UTXO service
    pub fn new(utxo_service: Arc<dyn UtxoService>) -> Self {
        Self { utxo_service }
    }

    /// Total balance: the sum of all aggregated UTXO amounts, starting from
    /// zero
    pub async fn get_balance(&self) -> WalletResult<U256> {
        let utxos = self.utxo_service.get_utxos().await?;
        Ok(utxos
            .values()
            .fold(U256::zero(), |total, value| total + value.amount))
    }
}
