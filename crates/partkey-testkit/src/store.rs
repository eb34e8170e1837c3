//! In-memory credential store.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use partkey_core::{
    Address, ClientError, CredentialStore, GeneratedCredential, GenerationRequest, KeyHandle,
    ParticipationCredential,
};
use sha2::{Digest, Sha256};

/// In-memory credential store with failure injection.
///
/// Verifiers are derived deterministically from the request so tests can
/// compare them.
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<BTreeMap<KeyHandle, ParticipationCredential>>,
    generated: RwLock<Vec<GenerationRequest>>,
    deleted: RwLock<Vec<KeyHandle>>,
    fail_generation: RwLock<HashSet<Address>>,
    fail_deletes: RwLock<bool>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an existing credential under its conventional handle.
    pub fn install(&self, credential: ParticipationCredential) -> KeyHandle {
        let handle = Self::handle_for(
            &credential.address,
            credential.first_valid.get(),
            credential.last_valid.get(),
        );
        self.credentials.write().insert(handle.clone(), credential);
        handle
    }

    /// Make generation fail for `address`.
    pub fn fail_generation_for(&self, address: &Address) {
        self.fail_generation.write().insert(address.clone());
    }

    /// Make every delete fail.
    pub fn fail_deletes(&self) {
        *self.fail_deletes.write() = true;
    }

    /// Whether `handle` is installed.
    #[must_use]
    pub fn contains(&self, handle: &KeyHandle) -> bool {
        self.credentials.read().contains_key(handle)
    }

    /// Installed credential count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.read().is_empty()
    }

    /// Generation requests received, in order.
    #[must_use]
    pub fn generation_requests(&self) -> Vec<GenerationRequest> {
        self.generated.read().clone()
    }

    /// Handles deleted, in order.
    #[must_use]
    pub fn deleted(&self) -> Vec<KeyHandle> {
        self.deleted.read().clone()
    }

    /// Credentials installed for `address`.
    #[must_use]
    pub fn credentials_for(&self, address: &Address) -> Vec<ParticipationCredential> {
        self.credentials
            .read()
            .values()
            .filter(|c| &c.address == address)
            .cloned()
            .collect()
    }

    fn handle_for(address: &Address, first: u64, last: u64) -> KeyHandle {
        KeyHandle::new(format!("memory/{address}.{first}.{last}.partkey"))
    }

    fn verifier(label: &str, request: &GenerationRequest) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update(request.address.as_str().as_bytes());
        hasher.update(request.first_valid.get().to_be_bytes());
        hasher.update(request.last_valid.get().to_be_bytes());
        hasher.finalize().into()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn list(&self) -> Result<BTreeMap<KeyHandle, ParticipationCredential>, ClientError> {
        Ok(self.credentials.read().clone())
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedCredential, ClientError> {
        self.generated.write().push(request.clone());
        if self.fail_generation.read().contains(&request.address) {
            return Err(ClientError::Request("key generation failed".to_string()));
        }

        let credential = ParticipationCredential {
            address: request.address.clone(),
            first_valid: request.first_valid,
            last_valid: request.last_valid,
            vote_verifier: Self::verifier("vote", request),
            selection_verifier: Self::verifier("selection", request),
            key_dilution: request.key_dilution,
        };

        let handle = match &request.output_dir {
            Some(dir) => KeyHandle::new(dir.join(format!(
                "{}.{}.{}.partkey",
                request.address, request.first_valid, request.last_valid
            ))),
            None => {
                let handle = Self::handle_for(
                    &request.address,
                    request.first_valid.get(),
                    request.last_valid.get(),
                );
                let mut credentials = self.credentials.write();
                if credentials.contains_key(&handle) {
                    return Err(ClientError::Rejected(format!(
                        "key file already exists: {handle}"
                    )));
                }
                credentials.insert(handle.clone(), credential.clone());
                handle
            }
        };

        Ok(GeneratedCredential { credential, handle })
    }

    async fn delete(&self, handle: &KeyHandle) -> Result<(), ClientError> {
        if *self.fail_deletes.read() {
            return Err(ClientError::Request("delete failed".to_string()));
        }
        self.credentials
            .write()
            .remove(handle)
            .ok_or_else(|| ClientError::NotFound(handle.to_string()))?;
        self.deleted.write().push(handle.clone());
        Ok(())
    }
}
