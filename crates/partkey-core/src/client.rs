//! Collaborator interfaces.
//!
//! The engine never talks to a node, wallet or disk directly. It drives these
//! traits, which are implemented by the embedding application (and by the
//! scripted doubles in `partkey-testkit`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{
    Address, GeneratedCredential, KeyHandle, MultisigInfo, NodeStatus, ParticipationCredential,
    PendingTransactionStatus, Round, StatusTransaction, SuggestedParams, TxId,
};

/// Read access to ledger progress and the pending pool.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Latest round known to the node.
    ///
    /// # Errors
    /// Returns an error if the node cannot be reached.
    async fn current_round(&self) -> Result<Round, ClientError>;

    /// Suggested parameters, including the consensus version in effect.
    ///
    /// # Errors
    /// Returns an error if the node cannot be reached.
    async fn suggested_params(&self) -> Result<SuggestedParams, ClientError>;

    /// Current node status.
    ///
    /// # Errors
    /// Returns an error if the node cannot be reached.
    async fn status(&self) -> Result<NodeStatus, ClientError>;

    /// Pending-pool status of a submitted transaction.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn pending_transaction(
        &self,
        tx_id: &TxId,
    ) -> Result<PendingTransactionStatus, ClientError>;

    /// Block until the node has observed `round`, then return its status.
    ///
    /// # Errors
    /// Returns an error if the node cannot be reached.
    async fn wait_for_round(&self, round: Round) -> Result<NodeStatus, ClientError>;
}

/// Parameters for creating a new credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Account the credential belongs to.
    pub address: Address,
    /// First valid round.
    pub first_valid: Round,
    /// Last valid round.
    pub last_valid: Round,
    /// Resolved (non-zero) key dilution.
    pub key_dilution: u64,
    /// Explicit output directory; `None` installs into managed storage.
    pub output_dir: Option<PathBuf>,
}

/// Storage and generation of participation credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Every installed credential keyed by its handle.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read.
    async fn list(&self) -> Result<BTreeMap<KeyHandle, ParticipationCredential>, ClientError>;

    /// Create a credential and persist its secret material.
    ///
    /// # Errors
    /// Returns an error if generation or persistence fails. Nothing is left
    /// behind on failure.
    async fn generate(&self, request: &GenerationRequest)
    -> Result<GeneratedCredential, ClientError>;

    /// Delete a credential's backing key material.
    ///
    /// # Errors
    /// Returns `NotFound` if the handle does not exist.
    async fn delete(&self, handle: &KeyHandle) -> Result<(), ClientError>;
}

/// Wallet-backed signing and broadcast.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign `txn` and broadcast it, returning its id.
    ///
    /// # Errors
    /// Returns an error if signing or broadcast fails.
    async fn sign_and_submit(&self, txn: &StatusTransaction) -> Result<TxId, ClientError>;

    /// Multisig metadata for `address`, if the wallet knows it as a multisig
    /// account.
    ///
    /// # Errors
    /// Returns an error if the wallet lookup fails.
    async fn multisig_info(&self, address: &Address) -> Result<Option<MultisigInfo>, ClientError>;
}

/// Destination for exported (unsigned) transaction artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist `bytes` at `path`.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), ClientError>;
}
