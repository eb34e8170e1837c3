//! Transaction dispatch: sign and submit, or export unsigned.
//!
//! ```text
//!                 ┌───────────┐
//!                 │   Built   │
//!                 └─────┬─────┘
//!          submit       │        export
//!        ┌──────────────┴──────────────┐
//!        ▼                             ▼
//! ┌─────────────┐              ┌──────────────┐
//! │  Submitted  │──▶ poller    │   Exported   │
//! └─────────────┘              └──────────────┘
//!        │ sign/submit error
//!        ▼
//! ┌─────────────┐
//! │   Failed    │  (RegistrationFailed, caller rolls back)
//! └─────────────┘
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::{ArtifactSink, LedgerClient, TransactionSigner};
use crate::error::{ClientError, LifecycleError, LifecycleResult};
use crate::poller::{ConfirmationPoller, WaitMode};
use crate::types::{MultisigInfo, Round, StatusTransaction, TxId};

/// What to do with a built transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// Sign, broadcast, and optionally wait for confirmation.
    Submit(WaitMode),

    /// Write the unsigned transaction to a file for offline signing.
    Export(PathBuf),
}

impl DispatchTarget {
    /// Choose export when a path is given, submission otherwise.
    #[must_use]
    pub fn from_export_path(export_path: Option<PathBuf>, wait_mode: WaitMode) -> Self {
        export_path.map_or(Self::Submit(wait_mode), Self::Export)
    }
}

/// Terminal result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Submitted and confirmed.
    Confirmed {
        /// Transaction id.
        tx_id: TxId,
        /// Round of confirmation.
        round: Round,
    },

    /// Submitted without waiting; not yet guaranteed.
    Submitted {
        /// Transaction id.
        tx_id: TxId,
    },

    /// Written unsigned to a file.
    Exported {
        /// Artifact location.
        path: PathBuf,
    },
}

impl DispatchOutcome {
    /// Transaction id, if the transaction was submitted.
    #[must_use]
    pub const fn tx_id(&self) -> Option<&TxId> {
        match self {
            Self::Confirmed { tx_id, .. } | Self::Submitted { tx_id } => Some(tx_id),
            Self::Exported { .. } => None,
        }
    }
}

/// Blank sub-signature slot of a multisig template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigSubsig {
    /// Participant public key.
    #[serde(with = "hex::serde")]
    pub key: [u8; 32],

    /// Signature bytes, empty until signed.
    #[serde(default)]
    pub sig: Vec<u8>,
}

/// Multisig signature template with every slot blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigTemplate {
    /// Multisig scheme version.
    pub version: u8,
    /// Signatures required.
    pub threshold: u8,
    /// One slot per participant, in order.
    pub subsigs: Vec<MultisigSubsig>,
}

impl MultisigTemplate {
    /// Blank template matching `info`.
    #[must_use]
    pub fn blank(info: &MultisigInfo) -> Self {
        Self {
            version: info.version,
            threshold: info.threshold,
            subsigs: info
                .public_keys
                .iter()
                .map(|key| MultisigSubsig {
                    key: *key,
                    sig: Vec::new(),
                })
                .collect(),
        }
    }
}

/// A status transaction wrapped with signature fields, so the exported bytes
/// carry the full signed-transaction shape even while unsigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransactionEnvelope {
    /// The transaction.
    pub txn: StatusTransaction,

    /// Single signature, empty while unsigned.
    #[serde(default)]
    pub sig: Vec<u8>,

    /// Multisig template, if the sender is a multisig account.
    #[serde(default)]
    pub msig: Option<MultisigTemplate>,
}

impl SignedTransactionEnvelope {
    /// Wrap `txn` with an empty signature.
    #[must_use]
    pub const fn unsigned(txn: StatusTransaction) -> Self {
        Self {
            txn,
            sig: Vec::new(),
            msig: None,
        }
    }

    /// Attach a blank multisig template.
    #[must_use]
    pub fn with_blank_multisig(mut self, info: &MultisigInfo) -> Self {
        self.msig = Some(MultisigTemplate::blank(info));
        self
    }

    /// Whether any signature has been filled in.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.sig.is_empty()
            || self
                .msig
                .as_ref()
                .is_some_and(|m| m.subsigs.iter().any(|s| !s.sig.is_empty()))
    }

    /// Serialize to CBOR.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ClientError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    /// Deserialize from CBOR.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if decoding fails.
    pub fn from_cbor(data: &[u8]) -> Result<Self, ClientError> {
        Ok(ciborium::from_reader(data)?)
    }
}

/// Writes artifacts to the local filesystem with owner-only permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileArtifactSink;

#[async_trait]
impl ArtifactSink for FileArtifactSink {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), ClientError> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Routes a built transaction to submission or export.
pub struct Dispatcher<'a> {
    ledger: &'a dyn LedgerClient,
    signer: &'a dyn TransactionSigner,
    sink: &'a dyn ArtifactSink,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher over the given collaborators.
    #[must_use]
    pub fn new(
        ledger: &'a dyn LedgerClient,
        signer: &'a dyn TransactionSigner,
        sink: &'a dyn ArtifactSink,
    ) -> Self {
        Self {
            ledger,
            signer,
            sink,
        }
    }

    /// Dispatch `txn` to `target`.
    ///
    /// # Errors
    ///
    /// - `RegistrationFailed` (with no rollback recorded) if signing or
    ///   submission fails. The caller owns any compensating action.
    /// - `PoolRejected` / `QueryFailed` from confirmation polling.
    /// - `Export` if the sender's multisig metadata cannot be read or the
    ///   artifact cannot be written.
    pub async fn dispatch(
        &self,
        txn: &StatusTransaction,
        target: &DispatchTarget,
    ) -> LifecycleResult<DispatchOutcome> {
        match target {
            DispatchTarget::Submit(wait_mode) => self.submit(txn, *wait_mode).await,
            DispatchTarget::Export(path) => self.export(txn, path).await,
        }
    }

    async fn submit(
        &self,
        txn: &StatusTransaction,
        wait_mode: WaitMode,
    ) -> LifecycleResult<DispatchOutcome> {
        let tx_id = self.signer.sign_and_submit(txn).await.map_err(|source| {
            LifecycleError::RegistrationFailed {
                address: txn.address.clone(),
                rolled_back: None,
                source,
            }
        })?;
        tracing::info!(%tx_id, address = %txn.address, "Submitted status change transaction");

        if wait_mode == WaitMode::FireAndForget {
            tracing::info!(%tx_id, "Not waiting: status will not change until transaction is finalized");
            return Ok(DispatchOutcome::Submitted { tx_id });
        }

        let start = self
            .ledger
            .status()
            .await
            .map_err(LifecycleError::QueryFailed)?;
        let round = ConfirmationPoller::new(self.ledger)
            .wait_for_confirmation(&tx_id, start.last_round)
            .await?;

        Ok(DispatchOutcome::Confirmed { tx_id, round })
    }

    async fn export(
        &self,
        txn: &StatusTransaction,
        path: &Path,
    ) -> LifecycleResult<DispatchOutcome> {
        let mut envelope = SignedTransactionEnvelope::unsigned(txn.clone());
        let multisig = self
            .signer
            .multisig_info(&txn.address)
            .await
            .map_err(|source| LifecycleError::Export {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(info) = multisig {
            envelope = envelope.with_blank_multisig(&info);
        }

        let bytes = envelope.to_cbor().map_err(|source| LifecycleError::Export {
            path: path.to_path_buf(),
            source,
        })?;
        self.sink
            .write(path, &bytes)
            .await
            .map_err(|source| LifecycleError::Export {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(path = %path.display(), address = %txn.address, "Wrote unsigned status change transaction");
        Ok(DispatchOutcome::Exported {
            path: path.to_path_buf(),
        })
    }
}
