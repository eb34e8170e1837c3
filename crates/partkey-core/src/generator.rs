//! Credential generation orchestration.
//!
//! No cryptography happens here. This decides where a credential goes and
//! what dilution it gets, then hands off to the [`CredentialStore`].

use std::path::PathBuf;

use crate::client::{CredentialStore, GenerationRequest};
use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{Address, GeneratedCredential, Round};

/// Where a newly generated credential is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CredentialDestination {
    /// Install into the store's managed location.
    #[default]
    Managed,

    /// Write into an explicit, already existing directory (offline creation).
    Directory(PathBuf),
}

/// Default key dilution for a credential spanning `[first_valid, last_valid]`.
///
/// `1 + floor(sqrt(last_valid - first_valid))`.
#[must_use]
pub const fn default_key_dilution(first_valid: Round, last_valid: Round) -> u64 {
    1 + last_valid.get().saturating_sub(first_valid.get()).isqrt()
}

/// Generate a credential for `address` over `[first_valid, last_valid]`.
///
/// A `key_dilution` of zero selects [`default_key_dilution`].
///
/// # Errors
///
/// Returns `InvalidRange` for an inverted range, `OutputDirMissing` if an
/// explicit directory does not exist, and `GenerationFailed` if the store
/// fails.
pub async fn generate_credential(
    store: &dyn CredentialStore,
    address: &Address,
    first_valid: Round,
    last_valid: Round,
    key_dilution: u64,
    destination: &CredentialDestination,
) -> LifecycleResult<GeneratedCredential> {
    if first_valid > last_valid {
        return Err(LifecycleError::InvalidRange {
            first_valid,
            last_valid,
        });
    }

    let output_dir = match destination {
        CredentialDestination::Managed => None,
        CredentialDestination::Directory(dir) => {
            if !dir.is_dir() {
                return Err(LifecycleError::OutputDirMissing(dir.clone()));
            }
            Some(dir.clone())
        }
    };

    let key_dilution = if key_dilution == 0 {
        default_key_dilution(first_valid, last_valid)
    } else {
        key_dilution
    };

    let request = GenerationRequest {
        address: address.clone(),
        first_valid,
        last_valid,
        key_dilution,
        output_dir,
    };

    let generated = store
        .generate(&request)
        .await
        .map_err(LifecycleError::GenerationFailed)?;

    tracing::info!(
        %address,
        %first_valid,
        %last_valid,
        key_dilution,
        handle = %generated.handle,
        "Generated participation key"
    );

    Ok(generated)
}
