//! Confirmation polling.
//!
//! The pending-pool status is the authoritative signal, so the loop has no
//! iteration cap. Callers needing a deadline wrap the future in
//! `tokio::time::timeout`; dropping it stops the wait but the submitted
//! transaction stays live on the network.

use serde::{Deserialize, Serialize};

use crate::client::LedgerClient;
use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{Round, TxId};

/// Whether a submission waits for the transaction to be confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitMode {
    /// Poll until confirmed or rejected.
    #[default]
    WaitForConfirmation,

    /// Treat a successful submission as sufficient. The status change is not
    /// guaranteed until the transaction is finalized.
    FireAndForget,
}

/// Polls a submitted transaction until it confirms or is rejected.
pub struct ConfirmationPoller<'a> {
    ledger: &'a dyn LedgerClient,
}

impl<'a> ConfirmationPoller<'a> {
    /// Create a poller over `ledger`.
    #[must_use]
    pub fn new(ledger: &'a dyn LedgerClient) -> Self {
        Self { ledger }
    }

    /// Block until `tx_id` is confirmed, starting from `start_round`.
    ///
    /// Each iteration queries the pool once. A pending transaction causes one
    /// wait for the next round before the next query.
    ///
    /// # Errors
    ///
    /// Returns `PoolRejected` if the pool evicts the transaction and
    /// `QueryFailed` if a status query or round wait fails. Neither is retried.
    pub async fn wait_for_confirmation(
        &self,
        tx_id: &TxId,
        start_round: Round,
    ) -> LifecycleResult<Round> {
        let mut round = start_round;
        loop {
            let status = self
                .ledger
                .pending_transaction(tx_id)
                .await
                .map_err(LifecycleError::QueryFailed)?;

            if status.is_confirmed() {
                tracing::info!(
                    %tx_id,
                    confirmed_round = %status.confirmed_round,
                    "Transaction committed"
                );
                return Ok(status.confirmed_round);
            }

            if status.is_rejected() {
                tracing::warn!(%tx_id, reason = %status.pool_error, "Transaction rejected by pool");
                return Err(LifecycleError::PoolRejected {
                    tx_id: tx_id.clone(),
                    reason: status.pool_error,
                });
            }

            tracing::info!(%tx_id, %round, "Transaction still pending as of round");
            let node = self
                .ledger
                .wait_for_round(round.next())
                .await
                .map_err(LifecycleError::QueryFailed)?;
            round = node.last_round.max(round.next());
        }
    }
}
