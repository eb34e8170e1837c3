//! Participation credential lifecycle and online-status transition engine.
//!
//! This crate rotates the time-bounded participation credentials an account
//! needs to take part in round-based consensus, without ever leaving the
//! account unauthorized or with two conflicting registrations in flight:
//!
//! - **Round window validation**: an expiry must clear one full transaction
//!   lifetime past the current round
//! - **Credential generation**: orchestrated through a [`CredentialStore`]
//! - **Status transactions**: go-online (binds a credential) and go-offline
//! - **Dispatch**: sign and submit, or export unsigned for offline signing
//! - **Confirmation polling**: round by round until confirmed or rejected
//! - **Batch renewal**: every account, sequentially, with per-account failures
//!   collected instead of aborting
//!
//! # Architecture
//!
//! ```text
//! Batch scheduler / single renewal
//!          │
//!          ▼
//!  validate_window ──▶ generate_credential ──▶ build_status_transaction
//!                                                        │
//!                                                        ▼
//!                       ConfirmationPoller ◀── Dispatcher (submit | export)
//! ```
//!
//! The node, wallet and key storage are collaborators behind the traits in
//! [`client`]. [`DirectoryCredentialStore`] and [`FileArtifactSink`] are
//! ready-made local implementations.
//!
//! # Example: Single Renewal
//!
//! ```ignore
//! use partkey_core::{LifecycleEngine, RenewalRequest, WaitMode};
//!
//! let engine = LifecycleEngine::builder()
//!     .ledger(node)
//!     .store(store)
//!     .signer(wallet)
//!     .config(EngineConfig::load("partkey.toml")?)
//!     .build()?;
//!
//! let outcome = engine
//!     .run_single_renewal(RenewalRequest::new("ALICE...", 3_000_000).wait_mode(WaitMode::WaitForConfirmation))
//!     .await?;
//! println!("registered {}", outcome.credential.handle);
//! ```
//!
//! # Cancellation
//!
//! Confirmation waits are unbounded. Wrap a call in `tokio::time::timeout` to
//! bound it; this stops the wait but never withdraws a submitted transaction.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod builder;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod generator;
pub mod lifecycle;
pub mod logging;
pub mod poller;
pub mod protocol;
pub mod store;
pub mod types;
pub mod window;

// Re-export commonly used types at crate root
pub use batch::{
    AccountOutcome, AccountResult, BatchReport, BatchRequest, BatchSummary, LapsePolicy,
    NodeBatchResult, RenewalDecision, renew_all_nodes, select_latest,
};
pub use builder::build_status_transaction;
pub use client::{ArtifactSink, CredentialStore, GenerationRequest, LedgerClient, TransactionSigner};
pub use config::EngineConfig;
pub use dispatch::{
    DispatchOutcome, DispatchTarget, Dispatcher, FileArtifactSink, MultisigTemplate,
    SignedTransactionEnvelope,
};
pub use engine::{
    CredentialSummary, LifecycleEngine, LifecycleEngineBuilder, RenewalRequest, RoundSnapshot,
    StatusChangeRequest, StatusIntent,
};
pub use error::{ClientError, LifecycleError, LifecycleResult, WindowTooShort};
pub use generator::{CredentialDestination, default_key_dilution, generate_credential};
pub use lifecycle::{LifecyclePhase, RenewalAttempt, RenewalOutcome};
pub use logging::{LogFormat, LoggingConfig, init_logging};
pub use poller::{ConfirmationPoller, WaitMode};
pub use protocol::{ProtocolEntry, ProtocolRegistry};
pub use store::DirectoryCredentialStore;
pub use types::{
    Address, ConsensusVersion, GeneratedCredential, KeyHandle, KeyRegistration, MultisigInfo,
    NodeStatus, ParticipationCredential, PendingTransactionStatus, ProtocolParameters, Round,
    StatusTransaction, SuggestedParams, TxId,
};
pub use window::validate_window;
