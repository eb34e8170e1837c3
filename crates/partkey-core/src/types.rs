//! Core data model: rounds, addresses, credentials and status transactions.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A ledger round. Totally ordered and monotonically non-decreasing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Round(pub u64);

impl Round {
    /// The zero round.
    pub const ZERO: Self = Self(0);

    /// Raw round number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The round immediately after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// This round advanced by `rounds`, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, rounds: u64) -> Self {
        Self(self.0.saturating_add(rounds))
    }

    /// Whether this is round zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Round {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account identifier owning a participation credential.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap an account address string.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Handle to externally persisted secret key material (a file path for
/// directory-backed stores).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHandle(PathBuf);

impl KeyHandle {
    /// Wrap a key file location.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The handle as a filesystem path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Identifier of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// Wrap a transaction id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Consensus version tag reported by the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsensusVersion(String);

impl ConsensusVersion {
    /// Wrap a consensus version tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsensusVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable protocol parameters for one consensus version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    /// Consensus version these parameters belong to.
    pub version: ConsensusVersion,

    /// Maximum number of rounds a transaction validity window may span.
    pub max_txn_life: u64,
}

/// Transaction parameters suggested by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedParams {
    /// Consensus version in effect.
    pub consensus_version: ConsensusVersion,

    /// Suggested fee.
    pub fee: u64,
}

/// Node status as reported by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Latest round the node has observed.
    pub last_round: Round,
}

/// Consensus-voting authorization for one account over a round range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationCredential {
    /// Account owning this credential.
    pub address: Address,

    /// First round (inclusive) in which the credential is valid.
    pub first_valid: Round,

    /// Last round (inclusive) in which the credential is valid.
    pub last_valid: Round,

    /// Vote verification key.
    #[serde(with = "hex::serde")]
    pub vote_verifier: [u8; 32],

    /// Selection verification key.
    #[serde(with = "hex::serde")]
    pub selection_verifier: [u8; 32],

    /// Key dilution of the two-level signing scheme.
    pub key_dilution: u64,
}

impl ParticipationCredential {
    /// Whether the credential is valid at `round`.
    #[must_use]
    pub fn is_valid_at(&self, round: Round) -> bool {
        self.first_valid <= round && round <= self.last_valid
    }

    /// Whether the credential covers every round up to and including `horizon`.
    #[must_use]
    pub fn covers(&self, horizon: Round) -> bool {
        self.last_valid >= horizon
    }
}

/// A credential together with the handle of its backing key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCredential {
    /// The public credential record.
    pub credential: ParticipationCredential,

    /// Where the secret material lives.
    pub handle: KeyHandle,
}

/// Credential binding embedded in a go-online transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRegistration {
    /// Vote verification key.
    #[serde(with = "hex::serde")]
    pub vote_verifier: [u8; 32],

    /// Selection verification key.
    #[serde(with = "hex::serde")]
    pub selection_verifier: [u8; 32],

    /// First round of the registered credential.
    pub vote_first: Round,

    /// Last round of the registered credential.
    pub vote_last: Round,

    /// Key dilution of the registered credential.
    pub key_dilution: u64,
}

impl From<&ParticipationCredential> for KeyRegistration {
    fn from(credential: &ParticipationCredential) -> Self {
        Self {
            vote_verifier: credential.vote_verifier,
            selection_verifier: credential.selection_verifier,
            vote_first: credential.first_valid,
            vote_last: credential.last_valid,
            key_dilution: credential.key_dilution,
        }
    }
}

/// Unsigned status-change transaction.
///
/// Carries a [`KeyRegistration`] when going online and none when going offline.
/// Its validity window is independent of the credential's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransaction {
    /// Sender whose status changes.
    pub address: Address,

    /// First round the transaction may be included in.
    pub first_valid: Round,

    /// Last round the transaction may be included in.
    pub last_valid: Round,

    /// Fee; zero means "use the network-suggested fee".
    pub fee: u64,

    /// Credential binding, present only for go-online transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<KeyRegistration>,
}

impl StatusTransaction {
    /// Whether this transaction registers a credential.
    #[must_use]
    pub const fn goes_online(&self) -> bool {
        self.registration.is_some()
    }
}

/// Result of polling a submitted transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransactionStatus {
    /// Round the transaction was confirmed in, zero while pending.
    pub confirmed_round: Round,

    /// Pool rejection reason, empty while the transaction is live.
    #[serde(default)]
    pub pool_error: String,
}

impl PendingTransactionStatus {
    /// Still waiting in the pool.
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// Confirmed in `round`.
    #[must_use]
    pub fn confirmed(round: impl Into<Round>) -> Self {
        Self {
            confirmed_round: round.into(),
            pool_error: String::new(),
        }
    }

    /// Evicted from the pool with `reason`.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            confirmed_round: Round::ZERO,
            pool_error: reason.into(),
        }
    }

    /// Whether the transaction has been confirmed.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        !self.confirmed_round.is_zero()
    }

    /// Whether the pool has rejected the transaction.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        !self.pool_error.is_empty()
    }
}

/// Multisig metadata of a sender, as known to the signing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigInfo {
    /// Multisig scheme version.
    pub version: u8,

    /// Signatures required.
    pub threshold: u8,

    /// Ordered public keys of the participants.
    pub public_keys: Vec<[u8; 32]>,
}
