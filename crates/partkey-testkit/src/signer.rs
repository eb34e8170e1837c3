//! Scripted signer and in-memory artifact sink.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use partkey_core::{
    Address, ArtifactSink, ClientError, MultisigInfo, StatusTransaction, TransactionSigner, TxId,
};
use sha2::{Digest, Sha256};

/// Signer that records submissions and fails for chosen addresses.
#[derive(Default)]
pub struct ScriptedSigner {
    submitted: RwLock<Vec<StatusTransaction>>,
    fail_for: RwLock<HashSet<Address>>,
    multisig: RwLock<HashMap<Address, MultisigInfo>>,
    fail_multisig_lookup: RwLock<bool>,
}

impl ScriptedSigner {
    /// Create a signer that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject submissions from `address`.
    pub fn fail_for(&self, address: &Address) {
        self.fail_for.write().insert(address.clone());
    }

    /// Report `address` as a multisig account.
    pub fn register_multisig(&self, address: &Address, info: MultisigInfo) {
        self.multisig.write().insert(address.clone(), info);
    }

    /// Make multisig lookups fail.
    pub fn fail_multisig_lookup(&self) {
        *self.fail_multisig_lookup.write() = true;
    }

    /// Transactions accepted, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<StatusTransaction> {
        self.submitted.read().clone()
    }

    /// Id this signer assigns to `txn`: hex(SHA-256(CBOR(txn))).
    ///
    /// # Panics
    ///
    /// Panics if the transaction cannot be encoded.
    #[must_use]
    pub fn tx_id_for(txn: &StatusTransaction) -> TxId {
        let mut buf = Vec::new();
        ciborium::into_writer(txn, &mut buf).expect("status transaction encodes");
        TxId::new(hex::encode(Sha256::digest(&buf)))
    }
}

#[async_trait]
impl TransactionSigner for ScriptedSigner {
    async fn sign_and_submit(&self, txn: &StatusTransaction) -> Result<TxId, ClientError> {
        if self.fail_for.read().contains(&txn.address) {
            return Err(ClientError::Rejected(format!(
                "wallet refused to sign for {}",
                txn.address
            )));
        }
        let tx_id = Self::tx_id_for(txn);
        tracing::debug!(address = %txn.address, %tx_id, "Scripted signer accepted transaction");
        self.submitted.write().push(txn.clone());
        Ok(tx_id)
    }

    async fn multisig_info(&self, address: &Address) -> Result<Option<MultisigInfo>, ClientError> {
        if *self.fail_multisig_lookup.read() {
            return Err(ClientError::Request("wallet unavailable".to_string()));
        }
        Ok(self.multisig.read().get(address).cloned())
    }
}

/// Artifact sink that keeps written bytes in memory.
#[derive(Default)]
pub struct MemoryArtifactSink {
    artifacts: RwLock<HashMap<PathBuf, Vec<u8>>>,
    fail: RwLock<bool>,
}

impl MemoryArtifactSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail.
    pub fn fail_writes(&self) {
        *self.fail.write() = true;
    }

    /// Bytes written at `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.artifacts.read().get(path).cloned()
    }

    /// Number of artifacts written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    /// Whether nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

#[async_trait]
impl ArtifactSink for MemoryArtifactSink {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), ClientError> {
        if *self.fail.read() {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only sink",
            )));
        }
        self.artifacts
            .write()
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}
