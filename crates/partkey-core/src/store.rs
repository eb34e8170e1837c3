//! Directory-backed credential store.
//!
//! Each credential lives in its own `<address>.<first>.<last>.partkey` file:
//! a CBOR record with the public credential and the Ed25519 vote and
//! selection secret keys whose public halves are the credential's verifiers.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::client::{CredentialStore, GenerationRequest};
use crate::error::ClientError;
use crate::types::{Address, GeneratedCredential, KeyHandle, ParticipationCredential};

/// File extension of credential files.
pub const CREDENTIAL_EXTENSION: &str = "partkey";

/// On-disk credential record.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct CredentialFile {
    #[zeroize(skip)]
    credential: ParticipationCredential,

    #[serde(with = "hex::serde")]
    vote_secret: [u8; 32],

    #[serde(with = "hex::serde")]
    selection_secret: [u8; 32],
}

/// Stores credentials as files in a managed directory.
#[derive(Debug, Clone)]
pub struct DirectoryCredentialStore {
    root: PathBuf,
}

impl DirectoryCredentialStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Managed directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for a credential.
    #[must_use]
    pub fn file_name(credential: &ParticipationCredential) -> String {
        format!(
            "{}.{}.{}.{CREDENTIAL_EXTENSION}",
            credential.address, credential.first_valid, credential.last_valid
        )
    }

    /// Key files are named after the address, so it must be one plain path
    /// component.
    fn check_address(address: &Address) -> Result<(), ClientError> {
        let mut components = Path::new(address.as_str()).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name.to_str() == Some(address.as_str()) => {
                Ok(())
            }
            _ => Err(ClientError::Rejected(format!(
                "address {address:?} cannot be used as a key file name"
            ))),
        }
    }

    fn read_file(path: &Path) -> Result<ParticipationCredential, ClientError> {
        let bytes = std::fs::read(path)?;
        let file: CredentialFile = ciborium::from_reader(bytes.as_slice())?;
        Ok(file.credential.clone())
    }

    fn write_new(path: &Path, bytes: &[u8]) -> Result<(), ClientError> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ClientError::Rejected(format!("key file already exists: {}", path.display()))
            } else {
                ClientError::Io(e)
            }
        })?;

        if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = std::fs::remove_file(path);
            return Err(ClientError::Io(e));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for DirectoryCredentialStore {
    async fn list(&self) -> Result<BTreeMap<KeyHandle, ParticipationCredential>, ClientError> {
        let mut credentials = BTreeMap::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CREDENTIAL_EXTENSION) {
                continue;
            }
            match Self::read_file(&path) {
                Ok(credential) => {
                    credentials.insert(KeyHandle::new(path), credential);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable key file");
                }
            }
        }
        Ok(credentials)
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedCredential, ClientError> {
        Self::check_address(&request.address)?;

        let mut rng = rand::rngs::OsRng;
        let vote = SigningKey::generate(&mut rng);
        let selection = SigningKey::generate(&mut rng);

        let file = CredentialFile {
            credential: ParticipationCredential {
                address: request.address.clone(),
                first_valid: request.first_valid,
                last_valid: request.last_valid,
                vote_verifier: vote.verifying_key().to_bytes(),
                selection_verifier: selection.verifying_key().to_bytes(),
                key_dilution: request.key_dilution,
            },
            vote_secret: vote.to_bytes(),
            selection_secret: selection.to_bytes(),
        };

        let dir = request.output_dir.as_deref().unwrap_or(&self.root);
        let path = dir.join(Self::file_name(&file.credential));

        let mut bytes = Vec::new();
        ciborium::into_writer(&file, &mut bytes)?;
        let written = Self::write_new(&path, &bytes);
        bytes.zeroize();
        written?;

        Ok(GeneratedCredential {
            credential: file.credential.clone(),
            handle: KeyHandle::new(path),
        })
    }

    async fn delete(&self, handle: &KeyHandle) -> Result<(), ClientError> {
        std::fs::remove_file(handle.as_path()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClientError::NotFound(handle.to_string())
            } else {
                ClientError::Io(e)
            }
        })
    }
}
