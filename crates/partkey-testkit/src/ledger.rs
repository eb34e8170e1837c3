//! Scripted ledger client.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use partkey_core::{
    ClientError, ConsensusVersion, LedgerClient, NodeStatus, PendingTransactionStatus, Round,
    SuggestedParams, TxId,
};

use crate::fixtures::TEST_CONSENSUS_VERSION;

/// A ledger whose pending-pool answers are scripted in advance.
///
/// Pool queries pop from a FIFO of scripted statuses; once it is empty every
/// query reports the transaction confirmed in the round after the current
/// one. Waiting for a round advances the ledger to that round immediately.
pub struct ScriptedLedger {
    round: Mutex<Round>,
    version: ConsensusVersion,
    statuses: Mutex<VecDeque<PendingTransactionStatus>>,
    queried: Mutex<Vec<TxId>>,
    waited: Mutex<Vec<Round>>,
    query_failures: AtomicUsize,
    fail_waits: AtomicBool,
    hang_waits: AtomicBool,
    fail_round_queries: AtomicBool,
}

impl ScriptedLedger {
    /// A ledger at `round` running the test consensus version.
    #[must_use]
    pub fn at_round(round: u64) -> Self {
        Self {
            round: Mutex::new(Round(round)),
            version: ConsensusVersion::new(TEST_CONSENSUS_VERSION),
            statuses: Mutex::new(VecDeque::new()),
            queried: Mutex::new(Vec::new()),
            waited: Mutex::new(Vec::new()),
            query_failures: AtomicUsize::new(0),
            fail_waits: AtomicBool::new(false),
            hang_waits: AtomicBool::new(false),
            fail_round_queries: AtomicBool::new(false),
        }
    }

    /// Report a different consensus version.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = ConsensusVersion::new(version);
        self
    }

    /// Queue pool statuses returned by the next queries, in order.
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = PendingTransactionStatus>) {
        self.statuses.lock().extend(statuses);
    }

    /// Make the next `count` pool queries fail.
    pub fn fail_next_queries(&self, count: usize) {
        self.query_failures.store(count, Ordering::SeqCst);
    }

    /// Make every round wait fail.
    pub fn fail_waits(&self) {
        self.fail_waits.store(true, Ordering::SeqCst);
    }

    /// Make every round wait block forever.
    pub fn hang_waits(&self) {
        self.hang_waits.store(true, Ordering::SeqCst);
    }

    /// Make `current_round` and `status` fail.
    pub fn fail_round_queries(&self) {
        self.fail_round_queries.store(true, Ordering::SeqCst);
    }

    /// Move the ledger to `round`.
    pub fn set_round(&self, round: u64) {
        *self.round.lock() = Round(round);
    }

    /// Current ledger round.
    #[must_use]
    pub fn round(&self) -> Round {
        *self.round.lock()
    }

    /// Number of pool queries made.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queried.lock().len()
    }

    /// Transaction ids queried, in order.
    #[must_use]
    pub fn queried(&self) -> Vec<TxId> {
        self.queried.lock().clone()
    }

    /// Rounds waited for, in order.
    #[must_use]
    pub fn waited_rounds(&self) -> Vec<Round> {
        self.waited.lock().clone()
    }

    /// Number of round waits made.
    #[must_use]
    pub fn wait_count(&self) -> usize {
        self.waited.lock().len()
    }

    fn check_round_queries(&self) -> Result<(), ClientError> {
        if self.fail_round_queries.load(Ordering::SeqCst) {
            return Err(ClientError::Request("node unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn current_round(&self) -> Result<Round, ClientError> {
        self.check_round_queries()?;
        Ok(self.round())
    }

    async fn suggested_params(&self) -> Result<SuggestedParams, ClientError> {
        self.check_round_queries()?;
        Ok(SuggestedParams {
            consensus_version: self.version.clone(),
            fee: 0,
        })
    }

    async fn status(&self) -> Result<NodeStatus, ClientError> {
        self.check_round_queries()?;
        Ok(NodeStatus {
            last_round: self.round(),
        })
    }

    async fn pending_transaction(
        &self,
        tx_id: &TxId,
    ) -> Result<PendingTransactionStatus, ClientError> {
        self.queried.lock().push(tx_id.clone());

        let remaining = self.query_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.query_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::Request("pending query failed".to_string()));
        }

        let scripted = self.statuses.lock().pop_front();
        Ok(scripted.unwrap_or_else(|| PendingTransactionStatus::confirmed(self.round().next())))
    }

    async fn wait_for_round(&self, round: Round) -> Result<NodeStatus, ClientError> {
        self.waited.lock().push(round);
        if self.hang_waits.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_waits.load(Ordering::SeqCst) {
            return Err(ClientError::Request("wait for round failed".to_string()));
        }

        let mut current = self.round.lock();
        if *current < round {
            *current = round;
        }
        Ok(NodeStatus {
            last_round: *current,
        })
    }
}
