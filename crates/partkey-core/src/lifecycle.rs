//! Single-account lifecycle state machine.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────────┐     ┌─────────────┐
//! │  Validated  │────▶│ CredentialGenerated │────▶│  Submitted  │──▶ Confirmed
//! └─────────────┘     └──────────┬──────────┘     └─────────────┘
//!                                │        └──────▶ Exported
//!                                ▼
//!                         ┌─────────────┐
//!                         │   Failed    │──▶ rollback (delete credential)
//!                         └─────────────┘
//! ```
//!
//! The reverse transition runs only for a `RegistrationFailed` error, at most
//! once per attempt. Pool rejections and query failures keep the credential,
//! since it may still be registered by a later resubmission.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::CredentialStore;
use crate::dispatch::DispatchOutcome;
use crate::error::LifecycleError;
use crate::types::{Address, GeneratedCredential, KeyHandle, Round, TxId};

/// Phase of a single-account lifecycle attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecyclePhase {
    /// Window validated; nothing created yet.
    Validated,

    /// A credential exists on disk but is not yet registered.
    CredentialGenerated {
        /// Backing key handle.
        handle: KeyHandle,
    },

    /// Transaction submitted without waiting for confirmation.
    Submitted {
        /// Submitted transaction.
        tx_id: TxId,
    },

    /// Transaction confirmed.
    Confirmed {
        /// Submitted transaction.
        tx_id: TxId,
        /// Confirmation round.
        round: Round,
    },

    /// Unsigned transaction exported for offline signing.
    Exported,

    /// Attempt failed.
    Failed {
        /// Error message.
        reason: String,
        /// Phase where failure occurred.
        at_phase: String,
        /// Whether the generated credential was deleted.
        rolled_back: bool,
    },
}

impl LifecyclePhase {
    /// Check if this is a terminal phase.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Submitted { .. } | Self::Confirmed { .. } | Self::Exported | Self::Failed { .. }
        )
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validated => write!(f, "Validated"),
            Self::CredentialGenerated { handle } => write!(f, "CredentialGenerated({handle})"),
            Self::Submitted { tx_id } => write!(f, "Submitted({tx_id})"),
            Self::Confirmed { tx_id, round } => write!(f, "Confirmed({tx_id}@{round})"),
            Self::Exported => write!(f, "Exported"),
            Self::Failed { reason, .. } => write!(f, "Failed({reason})"),
        }
    }
}

/// Result of a successful single-account renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalOutcome {
    /// Renewed account.
    pub address: Address,
    /// The new credential and its handle.
    pub credential: GeneratedCredential,
    /// How the registration transaction was dispatched.
    pub dispatch: DispatchOutcome,
    /// When the attempt finished.
    pub completed_at: DateTime<Utc>,
}

/// Tracks one attempt through [`LifecyclePhase`] and owns its rollback.
pub struct RenewalAttempt<'a> {
    store: &'a dyn CredentialStore,
    address: Address,
    phase: LifecyclePhase,
    generated: Option<GeneratedCredential>,
}

impl<'a> RenewalAttempt<'a> {
    /// Start an attempt whose window has already been validated.
    #[must_use]
    pub const fn validated(store: &'a dyn CredentialStore, address: Address) -> Self {
        Self {
            store,
            address,
            phase: LifecyclePhase::Validated,
            generated: None,
        }
    }

    /// Record the credential created for this attempt.
    pub fn credential_generated(&mut self, generated: GeneratedCredential) {
        self.phase = LifecyclePhase::CredentialGenerated {
            handle: generated.handle.clone(),
        };
        self.generated = Some(generated);
    }

    /// Record a successful dispatch of `credential`'s registration. The
    /// attempt can no longer roll back afterwards.
    pub fn dispatched(
        &mut self,
        credential: GeneratedCredential,
        dispatch: DispatchOutcome,
    ) -> RenewalOutcome {
        self.phase = match &dispatch {
            DispatchOutcome::Confirmed { tx_id, round } => LifecyclePhase::Confirmed {
                tx_id: tx_id.clone(),
                round: *round,
            },
            DispatchOutcome::Submitted { tx_id } => LifecyclePhase::Submitted {
                tx_id: tx_id.clone(),
            },
            DispatchOutcome::Exported { .. } => LifecyclePhase::Exported,
        };
        self.generated = None;
        RenewalOutcome {
            address: self.address.clone(),
            credential,
            dispatch,
            completed_at: Utc::now(),
        }
    }

    /// Move to `Failed`, rolling back the generated credential if the
    /// registration itself failed. Returns the error to surface.
    pub async fn fail(&mut self, error: LifecycleError) -> LifecycleError {
        let at_phase = self.phase.to_string();

        let error = match error {
            LifecycleError::RegistrationFailed {
                address, source, ..
            } => {
                let rolled_back = self.roll_back().await;
                LifecycleError::RegistrationFailed {
                    address,
                    rolled_back,
                    source,
                }
            }
            other => other,
        };

        let rolled_back = matches!(
            error,
            LifecycleError::RegistrationFailed {
                rolled_back: Some(_),
                ..
            }
        );
        self.phase = LifecyclePhase::Failed {
            reason: error.to_string(),
            at_phase,
            rolled_back,
        };
        error
    }

    /// Delete the generated credential. Runs at most once: the credential is
    /// taken out of the attempt before deletion.
    async fn roll_back(&mut self) -> Option<KeyHandle> {
        let generated = self.generated.take()?;
        let handle = generated.handle;
        match self.store.delete(&handle).await {
            Ok(()) => {
                tracing::warn!(
                    address = %self.address,
                    %handle,
                    "Error registering keys, deleted newly generated key file"
                );
                Some(handle)
            }
            Err(e) => {
                tracing::error!(
                    address = %self.address,
                    %handle,
                    error = %e,
                    "Error registering keys and could not delete key file; remove it manually"
                );
                None
            }
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> &LifecyclePhase {
        &self.phase
    }

    /// Account this attempt is for.
    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }
}
