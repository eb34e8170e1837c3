//! Batch renewal across every account with an installed credential.
//!
//! Accounts are processed sequentially in address order against a single
//! round snapshot. A failing account is recorded and the batch moves on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchTarget;
use crate::engine::LifecycleEngine;
use crate::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::RenewalOutcome;
use crate::poller::WaitMode;
use crate::types::{Address, KeyHandle, ParticipationCredential, Round};
use crate::window::validate_window;

/// How batch renewal treats a credential that ends before the horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LapsePolicy {
    /// Never renew automatically: every credential ending before the horizon
    /// is flagged for manual renewal.
    #[default]
    ManualBelowHorizon,

    /// Flag only credentials already expired at the current round; renew
    /// credentials still live but ending before the horizon.
    ManualWhenExpired,
}

/// Per-account decision made before any work is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    /// Existing credential already reaches the horizon.
    AlreadyCovered,
    /// Operator must renew explicitly.
    NeedsManualRenewal,
    /// Generate and register a new credential.
    Renew,
}

impl LapsePolicy {
    /// Classify an account whose latest credential ends at `last_valid`.
    #[must_use]
    pub fn classify(self, last_valid: Round, current: Round, horizon: Round) -> RenewalDecision {
        if last_valid >= horizon {
            return RenewalDecision::AlreadyCovered;
        }
        match self {
            Self::ManualBelowHorizon => RenewalDecision::NeedsManualRenewal,
            Self::ManualWhenExpired if last_valid < current => RenewalDecision::NeedsManualRenewal,
            Self::ManualWhenExpired => RenewalDecision::Renew,
        }
    }
}

/// Keep, per address, only the credential with the greatest last valid round.
#[must_use]
pub fn select_latest(
    credentials: BTreeMap<KeyHandle, ParticipationCredential>,
) -> BTreeMap<Address, (KeyHandle, ParticipationCredential)> {
    let mut latest: BTreeMap<Address, (KeyHandle, ParticipationCredential)> = BTreeMap::new();
    for (handle, credential) in credentials {
        if let Some((_, existing)) = latest.get(&credential.address) {
            if existing.last_valid >= credential.last_valid {
                continue;
            }
        }
        latest.insert(credential.address.clone(), (handle, credential));
    }
    latest
}

/// Parameters shared by every account in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// Horizon every renewed credential must reach.
    pub last_valid: Round,
    /// Transaction fee; `None` uses the configured default.
    pub fee: Option<u64>,
    /// Key dilution; `None` uses the configured default.
    pub key_dilution: Option<u64>,
    /// Wait behavior; `None` uses the configured default.
    pub wait_mode: Option<WaitMode>,
}

impl BatchRequest {
    /// Renew through `last_valid` with configured defaults.
    #[must_use]
    pub fn new(last_valid: impl Into<Round>) -> Self {
        Self {
            last_valid: last_valid.into(),
            fee: None,
            key_dilution: None,
            wait_mode: None,
        }
    }
}

/// What happened to one account.
#[derive(Debug)]
pub enum AccountOutcome {
    /// New credential generated and registered.
    Renewed(Box<RenewalOutcome>),
    /// Existing credential already reaches the horizon.
    AlreadyCovered {
        /// Last valid round of the existing credential.
        existing: Round,
    },
    /// Skipped; the operator must renew this account explicitly.
    NeedsManualRenewal {
        /// Last valid round of the existing credential.
        existing: Round,
    },
    /// Renewal was attempted and failed.
    Failed(LifecycleError),
}

impl AccountOutcome {
    /// Short machine-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Renewed(_) => "renewed",
            Self::AlreadyCovered { .. } => "already-covered",
            Self::NeedsManualRenewal { .. } => "needs-manual-renewal",
            Self::Failed(_) => "failed",
        }
    }
}

/// Outcome of one account in a batch.
#[derive(Debug)]
pub struct AccountResult {
    /// The account.
    pub address: Address,
    /// What happened.
    pub outcome: AccountOutcome,
}

/// Ordered per-account results of a batch renewal.
#[derive(Debug)]
pub struct BatchReport {
    /// Requested horizon.
    pub horizon: Round,
    /// Round the batch snapshot was taken at.
    pub current_round: Round,
    /// One entry per address, sorted by address.
    pub results: Vec<AccountResult>,
}

impl BatchReport {
    /// Accounts renewed.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, AccountOutcome::Renewed(_)))
    }

    /// Accounts that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, AccountOutcome::Failed(_)))
    }

    /// Accounts skipped for any reason.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                AccountOutcome::AlreadyCovered { .. } | AccountOutcome::NeedsManualRenewal { .. }
            )
        })
    }

    /// Accounts flagged for manual renewal.
    #[must_use]
    pub fn needs_manual_renewal(&self) -> Vec<&Address> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, AccountOutcome::NeedsManualRenewal { .. }))
            .map(|r| &r.address)
            .collect()
    }

    /// Per-address errors, in address order.
    #[must_use]
    pub fn errors(&self) -> Vec<(&Address, &LifecycleError)> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                AccountOutcome::Failed(e) => Some((&r.address, e)),
                _ => None,
            })
            .collect()
    }

    /// Look up one account's outcome.
    #[must_use]
    pub fn outcome(&self, address: &Address) -> Option<&AccountOutcome> {
        self.results
            .iter()
            .find(|r| &r.address == address)
            .map(|r| &r.outcome)
    }

    /// Turn the report into an aggregate result.
    ///
    /// # Errors
    ///
    /// Returns `BatchFailed` if at least one account failed.
    pub fn into_result(self) -> LifecycleResult<Self> {
        let failed = self.failed();
        if failed > 0 {
            return Err(LifecycleError::BatchFailed {
                failed,
                succeeded: self.succeeded(),
            });
        }
        Ok(self)
    }

    /// Serializable summary of the report.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            horizon: self.horizon,
            current_round: self.current_round,
            succeeded: self.succeeded(),
            failed: self.failed(),
            skipped: self.skipped(),
            accounts: self
                .results
                .iter()
                .map(|r| AccountSummary {
                    address: r.address.clone(),
                    status: r.outcome.label(),
                    detail: match &r.outcome {
                        AccountOutcome::Renewed(outcome) => outcome.credential.handle.to_string(),
                        AccountOutcome::AlreadyCovered { existing }
                        | AccountOutcome::NeedsManualRenewal { existing } => {
                            format!("existing key valid through {existing}")
                        }
                        AccountOutcome::Failed(e) => e.to_string(),
                    },
                })
                .collect(),
        }
    }

    fn count(&self, pred: impl Fn(&AccountOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// One account row of a [`BatchSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    /// The account.
    pub address: Address,
    /// Outcome label.
    pub status: &'static str,
    /// Human-readable detail.
    pub detail: String,
}

/// Serializable "N succeeded, M failed" view of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Requested horizon.
    pub horizon: Round,
    /// Snapshot round.
    pub current_round: Round,
    /// Accounts renewed.
    pub succeeded: usize,
    /// Accounts failed.
    pub failed: usize,
    /// Accounts skipped.
    pub skipped: usize,
    /// Per-account rows.
    pub accounts: Vec<AccountSummary>,
}

impl BatchSummary {
    /// Render as JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> LifecycleResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| LifecycleError::Serialization(e.to_string()))
    }
}

impl LifecycleEngine {
    /// Renew every account whose latest credential falls short of
    /// `request.last_valid`, subject to the configured [`LapsePolicy`].
    ///
    /// The round and protocol parameters are read once for the whole batch.
    /// Registrations are always submitted directly, never exported.
    ///
    /// # Errors
    ///
    /// Returns `WindowTooShort` (aborting the whole batch) if the horizon is
    /// too close, or `QueryFailed` if the snapshot or listing cannot be read.
    /// Per-account failures are reported in the [`BatchReport`]; use
    /// [`BatchReport::into_result`] for an aggregate error.
    #[tracing::instrument(name = "batch_renewal", skip_all, fields(horizon = %request.last_valid))]
    pub async fn run_batch_renewal(&self, request: &BatchRequest) -> LifecycleResult<BatchReport> {
        let installed = self
            .store
            .list()
            .await
            .map_err(LifecycleError::QueryFailed)?;
        let accounts = select_latest(installed);

        let snapshot = self.snapshot().await?;
        validate_window(
            snapshot.current_round,
            request.last_valid,
            snapshot.params.max_txn_life,
        )?;

        let fee = self.config.fee_or_default(request.fee);
        let key_dilution = self.config.dilution_or_default(request.key_dilution);
        let target = DispatchTarget::Submit(self.config.wait_mode_or_default(request.wait_mode));
        let policy = self.config.lapse_policy;

        tracing::info!(
            accounts = accounts.len(),
            horizon = %request.last_valid,
            current_round = %snapshot.current_round,
            ?policy,
            "Renewing participation keys"
        );

        let mut results = Vec::with_capacity(accounts.len());
        for (address, (_, credential)) in accounts {
            let existing = credential.last_valid;
            let outcome = match policy.classify(existing, snapshot.current_round, request.last_valid)
            {
                RenewalDecision::AlreadyCovered => {
                    tracing::info!(
                        %address,
                        %existing,
                        horizon = %request.last_valid,
                        "Skipping account: already has a participation key valid beyond horizon"
                    );
                    AccountOutcome::AlreadyCovered { existing }
                }
                RenewalDecision::NeedsManualRenewal => {
                    tracing::warn!(
                        %address,
                        %existing,
                        "Skipping account: participation key expires before horizon, renew it explicitly"
                    );
                    AccountOutcome::NeedsManualRenewal { existing }
                }
                RenewalDecision::Renew => match self
                    .renew_account(
                        &address,
                        &snapshot,
                        request.last_valid,
                        fee,
                        key_dilution,
                        &target,
                    )
                    .await
                {
                    Ok(outcome) => AccountOutcome::Renewed(Box::new(outcome)),
                    Err(e) => {
                        tracing::error!(%address, error = %e, "Error renewing participation key");
                        AccountOutcome::Failed(e)
                    }
                },
            };
            results.push(AccountResult { address, outcome });
        }

        let report = BatchReport {
            horizon: request.last_valid,
            current_round: snapshot.current_round,
            results,
        };
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Batch renewal finished"
        );
        Ok(report)
    }
}

/// Result of a batch on one named node.
#[derive(Debug)]
pub struct NodeBatchResult {
    /// Node name (typically its data directory).
    pub node: String,
    /// The node's report, or the error that aborted its batch.
    pub result: LifecycleResult<BatchReport>,
}

/// Run the same batch renewal on several nodes in turn. A node whose batch
/// aborts does not stop the others.
pub async fn renew_all_nodes<'a, I>(nodes: I, request: &BatchRequest) -> Vec<NodeBatchResult>
where
    I: IntoIterator<Item = (&'a str, &'a LifecycleEngine)>,
{
    let mut results = Vec::new();
    for (node, engine) in nodes {
        tracing::info!(node, "Renewing participation keys on node");
        let result = engine.run_batch_renewal(request).await;
        if let Err(e) = &result {
            tracing::error!(node, error = %e, "Batch renewal aborted on node");
        }
        results.push(NodeBatchResult {
            node: node.to_string(),
            result,
        });
    }
    results
}
