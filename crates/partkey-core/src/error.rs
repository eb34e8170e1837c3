//! Lifecycle error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Address, ConsensusVersion, KeyHandle, Round, TxId};

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// A requested expiry round does not clear one full transaction lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "last valid round {requested} must be greater than current round {current} plus max transaction life {max_txn_life}"
)]
pub struct WindowTooShort {
    /// Requested last valid round.
    pub requested: Round,
    /// Round at the time of validation.
    pub current: Round,
    /// Protocol maximum transaction lifetime.
    pub max_txn_life: u64,
}

/// Errors reported by collaborators (network client, credential store,
/// signer, artifact sink).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request to the node or wallet failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ciborium::ser::Error<std::io::Error>> for ClientError {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for ClientError {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Errors that can occur while driving a credential lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Requested window is too close to the current round.
    #[error(transparent)]
    WindowTooShort(#[from] WindowTooShort),

    /// A status transaction was requested with zero valid rounds.
    #[error("status transaction must be valid for at least one round")]
    ZeroValidity,

    /// Credential range is inverted.
    #[error("invalid credential range: first valid {first_valid} is after last valid {last_valid}")]
    InvalidRange {
        /// Requested first round.
        first_valid: Round,
        /// Requested last round.
        last_valid: Round,
    },

    /// A credential already covers the requested horizon.
    #[error(
        "account already has a participation key valid through {existing}, which covers requested round {requested}"
    )]
    ExistingCredential {
        /// Requested last valid round.
        requested: Round,
        /// Last valid round of the existing credential.
        existing: Round,
    },

    /// Explicit output directory does not exist.
    #[error("output directory does not exist: {}", .0.display())]
    OutputDirMissing(PathBuf),

    /// Go-online was requested but the account has no installed credential.
    #[error("no participation key installed for account {0}")]
    NoCredential(Address),

    /// The node reported a consensus version missing from the registry.
    #[error("unknown consensus protocol version: {0}")]
    UnknownProtocol(ConsensusVersion),

    /// Credential creation failed; nothing was created.
    #[error("participation key generation failed: {0}")]
    GenerationFailed(#[source] ClientError),

    /// Signing or submission failed after a credential was generated.
    #[error("status change registration failed for {address}: {source}")]
    RegistrationFailed {
        /// Account whose registration failed.
        address: Address,
        /// Handle of the credential deleted by rollback, if one was generated.
        rolled_back: Option<KeyHandle>,
        /// Underlying failure.
        #[source]
        source: ClientError,
    },

    /// The transaction was evicted from the pending pool.
    #[error("transaction {tx_id} was rejected by the pool: {reason}")]
    PoolRejected {
        /// Rejected transaction.
        tx_id: TxId,
        /// Pool reason string.
        reason: String,
    },

    /// Querying the network failed.
    #[error("network query failed: {0}")]
    QueryFailed(#[source] ClientError),

    /// Writing an exported transaction failed.
    #[error("failed to write transaction to {}: {source}", path.display())]
    Export {
        /// Destination path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: ClientError,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// One or more accounts in a batch failed.
    #[error("{failed} renewal attempt(s) failed, {succeeded} succeeded")]
    BatchFailed {
        /// Accounts that failed.
        failed: usize,
        /// Accounts that were renewed.
        succeeded: usize,
    },
}

impl LifecycleError {
    /// Whether this error is terminal for the submitted transaction, meaning
    /// it will never confirm.
    #[must_use]
    pub const fn is_pool_rejection(&self) -> bool {
        matches!(self, Self::PoolRejected { .. })
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for LifecycleError {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for LifecycleError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
