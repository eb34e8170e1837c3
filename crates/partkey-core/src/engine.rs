//! The lifecycle engine: single-account operations over the collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use crate::batch::select_latest;
use crate::builder::build_status_transaction;
use crate::client::{ArtifactSink, CredentialStore, LedgerClient, TransactionSigner};
use crate::config::EngineConfig;
use crate::dispatch::{DispatchOutcome, DispatchTarget, Dispatcher, FileArtifactSink};
use crate::error::{LifecycleError, LifecycleResult};
use crate::generator::{CredentialDestination, generate_credential};
use crate::lifecycle::{RenewalAttempt, RenewalOutcome};
use crate::poller::WaitMode;
use crate::protocol::ProtocolRegistry;
use crate::types::{
    Address, GeneratedCredential, KeyHandle, ParticipationCredential, ProtocolParameters, Round,
};
use crate::window::validate_window;

/// Round and protocol state captured once per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    /// Latest round at capture time.
    pub current_round: Round,
    /// Protocol parameters in effect.
    pub params: ProtocolParameters,
}

/// Request to renew one account's credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalRequest {
    /// Account to renew.
    pub address: Address,
    /// Last valid round of the new credential.
    pub last_valid: Round,
    /// Transaction fee; `None` uses the configured default.
    pub fee: Option<u64>,
    /// Key dilution; `None` uses the configured default.
    pub key_dilution: Option<u64>,
    /// Wait behavior; `None` uses the configured default.
    pub wait_mode: Option<WaitMode>,
    /// Export the registration instead of submitting it.
    pub export_path: Option<PathBuf>,
}

impl RenewalRequest {
    /// Renew `address` through `last_valid` with configured defaults.
    #[must_use]
    pub fn new(address: impl Into<Address>, last_valid: impl Into<Round>) -> Self {
        Self {
            address: address.into(),
            last_valid: last_valid.into(),
            fee: None,
            key_dilution: None,
            wait_mode: None,
            export_path: None,
        }
    }

    /// Set the fee.
    #[must_use]
    pub const fn fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Set the key dilution.
    #[must_use]
    pub const fn key_dilution(mut self, dilution: u64) -> Self {
        self.key_dilution = Some(dilution);
        self
    }

    /// Set the wait behavior.
    #[must_use]
    pub const fn wait_mode(mut self, wait_mode: WaitMode) -> Self {
        self.wait_mode = Some(wait_mode);
        self
    }

    /// Export the registration to `path` instead of submitting.
    #[must_use]
    pub fn export_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }
}

/// Target online status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusIntent {
    /// Register a credential. `None` selects the installed credential with the
    /// greatest last valid round.
    Online(Option<ParticipationCredential>),

    /// Revoke participation.
    Offline,
}

/// Request to change an account's online status without generating a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChangeRequest {
    /// Account whose status changes.
    pub address: Address,
    /// Online or offline.
    pub intent: StatusIntent,
    /// First valid round of the transaction; `None` or zero means current.
    pub first_valid: Option<Round>,
    /// Validity length; `None` or zero means the protocol max lifetime.
    pub valid_rounds: Option<u64>,
    /// Transaction fee; `None` uses the configured default.
    pub fee: Option<u64>,
    /// Wait behavior; `None` uses the configured default.
    pub wait_mode: Option<WaitMode>,
    /// Export instead of submitting.
    pub export_path: Option<PathBuf>,
}

impl StatusChangeRequest {
    /// Change `address` to `intent` with configured defaults.
    #[must_use]
    pub fn new(address: impl Into<Address>, intent: StatusIntent) -> Self {
        Self {
            address: address.into(),
            intent,
            first_valid: None,
            valid_rounds: None,
            fee: None,
            wait_mode: None,
            export_path: None,
        }
    }
}

/// One row of a credential listing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CredentialSummary {
    /// Backing key handle.
    pub handle: KeyHandle,
    /// Owning account.
    pub address: Address,
    /// First valid round.
    pub first_valid: Round,
    /// Last valid round.
    pub last_valid: Round,
    /// Key dilution.
    pub key_dilution: u64,
    /// Vote verification key.
    #[serde(with = "hex::serde")]
    pub vote_verifier: [u8; 32],
    /// Selection verification key.
    #[serde(with = "hex::serde")]
    pub selection_verifier: [u8; 32],
}

/// Drives credential generation, registration and renewal.
pub struct LifecycleEngine {
    pub(crate) ledger: Arc<dyn LedgerClient>,
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) signer: Arc<dyn TransactionSigner>,
    pub(crate) sink: Arc<dyn ArtifactSink>,
    pub(crate) protocols: ProtocolRegistry,
    pub(crate) config: EngineConfig,
}

impl LifecycleEngine {
    /// Create a new engine builder.
    #[must_use]
    pub fn builder() -> LifecycleEngineBuilder {
        LifecycleEngineBuilder::default()
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Capture the current round and protocol parameters.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the node cannot be queried, `UnknownProtocol`
    /// for an unregistered consensus version.
    pub async fn snapshot(&self) -> LifecycleResult<RoundSnapshot> {
        let current_round = self
            .ledger
            .current_round()
            .await
            .map_err(LifecycleError::QueryFailed)?;
        let suggested = self
            .ledger
            .suggested_params()
            .await
            .map_err(LifecycleError::QueryFailed)?;
        let params = self.protocols.lookup(&suggested.consensus_version)?.clone();
        if params.max_txn_life == 0 {
            return Err(LifecycleError::Config(format!(
                "protocol {} has a zero max_txn_life",
                params.version
            )));
        }

        tracing::debug!(
            %current_round,
            version = %params.version,
            max_txn_life = params.max_txn_life,
            "Captured round snapshot"
        );
        Ok(RoundSnapshot {
            current_round,
            params,
        })
    }

    /// Generate a credential without registering it.
    ///
    /// `key_dilution` of `None` uses the configured default.
    ///
    /// # Errors
    ///
    /// See [`generate_credential`].
    pub async fn add_credential(
        &self,
        address: &Address,
        first_valid: Round,
        last_valid: Round,
        key_dilution: Option<u64>,
        destination: &CredentialDestination,
    ) -> LifecycleResult<GeneratedCredential> {
        generate_credential(
            self.store.as_ref(),
            address,
            first_valid,
            last_valid,
            self.config.dilution_or_default(key_dilution),
            destination,
        )
        .await
    }

    /// Every installed credential, sorted by key handle.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the store cannot be read.
    pub async fn list_credentials(&self) -> LifecycleResult<Vec<CredentialSummary>> {
        let credentials = self
            .store
            .list()
            .await
            .map_err(LifecycleError::QueryFailed)?;

        Ok(credentials
            .into_iter()
            .map(|(handle, credential)| CredentialSummary {
                handle,
                address: credential.address,
                first_valid: credential.first_valid,
                last_valid: credential.last_valid,
                key_dilution: credential.key_dilution,
                vote_verifier: credential.vote_verifier,
                selection_verifier: credential.selection_verifier,
            })
            .collect())
    }

    /// Change an account's online status with an existing (or no) credential.
    ///
    /// # Errors
    ///
    /// Returns `NoCredential` when going online without an installed
    /// credential, and dispatch errors otherwise. Nothing is generated, so
    /// nothing is rolled back.
    pub async fn change_online_status(
        &self,
        request: StatusChangeRequest,
    ) -> LifecycleResult<DispatchOutcome> {
        let snapshot = self.snapshot().await?;

        let credential = match request.intent {
            StatusIntent::Offline => None,
            StatusIntent::Online(Some(credential)) => Some(credential),
            StatusIntent::Online(None) => {
                let installed = self
                    .store
                    .list()
                    .await
                    .map_err(LifecycleError::QueryFailed)?;
                let credential = select_latest(installed)
                    .remove(&request.address)
                    .map(|(_, credential)| credential)
                    .ok_or_else(|| LifecycleError::NoCredential(request.address.clone()))?;
                Some(credential)
            }
        };

        let first_valid = request
            .first_valid
            .filter(|round| !round.is_zero())
            .unwrap_or(snapshot.current_round);
        let valid_rounds = request
            .valid_rounds
            .filter(|rounds| *rounds != 0)
            .unwrap_or(snapshot.params.max_txn_life);

        let txn = build_status_transaction(
            &request.address,
            credential.as_ref(),
            first_valid,
            valid_rounds,
            self.config.fee_or_default(request.fee),
        )?;

        let target = DispatchTarget::from_export_path(
            request.export_path,
            self.config.wait_mode_or_default(request.wait_mode),
        );
        self.dispatcher().dispatch(&txn, &target).await
    }

    /// Generate a fresh credential for one account and register it.
    ///
    /// # Errors
    ///
    /// - `WindowTooShort` if `last_valid` is too close to the current round.
    /// - `ExistingCredential` if a credential already covers `last_valid`.
    /// - `GenerationFailed`, `RegistrationFailed` (after rollback),
    ///   `PoolRejected`, `QueryFailed`, `Export` from the lifecycle steps.
    #[tracing::instrument(
        name = "renewal",
        skip_all,
        fields(address = %request.address, last_valid = %request.last_valid)
    )]
    pub async fn run_single_renewal(
        &self,
        request: RenewalRequest,
    ) -> LifecycleResult<RenewalOutcome> {
        let snapshot = self.snapshot().await?;
        validate_window(
            snapshot.current_round,
            request.last_valid,
            snapshot.params.max_txn_life,
        )?;

        let installed = self
            .store
            .list()
            .await
            .map_err(LifecycleError::QueryFailed)?;
        if let Some(existing) = installed
            .values()
            .filter(|c| c.address == request.address && c.covers(request.last_valid))
            .map(|c| c.last_valid)
            .max()
        {
            return Err(LifecycleError::ExistingCredential {
                requested: request.last_valid,
                existing,
            });
        }

        let target = DispatchTarget::from_export_path(
            request.export_path,
            self.config.wait_mode_or_default(request.wait_mode),
        );
        self.renew_account(
            &request.address,
            &snapshot,
            request.last_valid,
            self.config.fee_or_default(request.fee),
            self.config.dilution_or_default(request.key_dilution),
            &target,
        )
        .await
    }

    /// Generate, build, dispatch, and roll back on registration failure.
    /// The window must already be validated against `snapshot`.
    pub(crate) async fn renew_account(
        &self,
        address: &Address,
        snapshot: &RoundSnapshot,
        last_valid: Round,
        fee: u64,
        key_dilution: u64,
        target: &DispatchTarget,
    ) -> LifecycleResult<RenewalOutcome> {
        let mut attempt = RenewalAttempt::validated(self.store.as_ref(), address.clone());

        let generated = match generate_credential(
            self.store.as_ref(),
            address,
            snapshot.current_round,
            last_valid,
            key_dilution,
            &CredentialDestination::Managed,
        )
        .await
        {
            Ok(generated) => generated,
            Err(e) => return Err(attempt.fail(e).await),
        };
        attempt.credential_generated(generated.clone());

        let txn = match build_status_transaction(
            address,
            Some(&generated.credential),
            snapshot.current_round,
            snapshot.params.max_txn_life,
            fee,
        ) {
            Ok(txn) => txn,
            Err(e) => return Err(attempt.fail(e).await),
        };

        match self.dispatcher().dispatch(&txn, target).await {
            Ok(dispatch) => Ok(attempt.dispatched(generated, dispatch)),
            Err(e) => Err(attempt.fail(e).await),
        }
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(
            self.ledger.as_ref(),
            self.signer.as_ref(),
            self.sink.as_ref(),
        )
    }
}

/// Builder for [`LifecycleEngine`].
#[derive(Default)]
pub struct LifecycleEngineBuilder {
    ledger: Option<Arc<dyn LedgerClient>>,
    store: Option<Arc<dyn CredentialStore>>,
    signer: Option<Arc<dyn TransactionSigner>>,
    sink: Option<Arc<dyn ArtifactSink>>,
    protocols: Option<ProtocolRegistry>,
    config: EngineConfig,
}

impl LifecycleEngineBuilder {
    /// Set the ledger client.
    #[must_use]
    pub fn ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the credential store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the transaction signer.
    #[must_use]
    pub fn signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Set the artifact sink. Defaults to [`FileArtifactSink`].
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the protocol registry. Defaults to the config's `[[protocol]]`
    /// entries.
    #[must_use]
    pub fn protocols(mut self, protocols: ProtocolRegistry) -> Self {
        self.protocols = Some(protocols);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required collaborator is missing or
    /// the protocol configuration is invalid.
    pub fn build(self) -> LifecycleResult<LifecycleEngine> {
        let ledger = self
            .ledger
            .ok_or_else(|| LifecycleError::Config("ledger client is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| LifecycleError::Config("credential store is required".to_string()))?;
        let signer = self
            .signer
            .ok_or_else(|| LifecycleError::Config("transaction signer is required".to_string()))?;
        let sink = self.sink.unwrap_or_else(|| Arc::new(FileArtifactSink));
        let protocols = match self.protocols {
            Some(protocols) => protocols,
            None => self.config.protocol_registry()?,
        };

        Ok(LifecycleEngine {
            ledger,
            store,
            signer,
            sink,
            protocols,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_ledger() {
        let result = LifecycleEngine::builder().build();
        assert!(matches!(result, Err(LifecycleError::Config(_))));
    }

    #[test]
    fn test_renewal_request_setters() {
        let request = RenewalRequest::new("ALICE", 5000)
            .fee(1000)
            .key_dilution(64)
            .wait_mode(WaitMode::FireAndForget)
            .export_to("/tmp/renew.tx");

        assert_eq!(request.address, Address::new("ALICE"));
        assert_eq!(request.last_valid, Round(5000));
        assert_eq!(request.fee, Some(1000));
        assert_eq!(request.key_dilution, Some(64));
        assert_eq!(request.wait_mode, Some(WaitMode::FireAndForget));
        assert_eq!(request.export_path, Some(PathBuf::from("/tmp/renew.tx")));
    }
}
