//! Test kit for the partkey lifecycle engine.
//!
//! - [`ScriptedLedger`] - node whose pending-pool answers are scripted
//! - [`MemoryCredentialStore`] - credential store with failure injection
//! - [`ScriptedSigner`] / [`MemoryArtifactSink`] - wallet and export sink
//! - [`EngineHarness`] - all of the above wired into a [`LifecycleEngine`]
//! - Fixtures, assertion helpers, and tracing for test output
//!
//! # Example
//!
//! ```rust,ignore
//! use partkey_testkit::{EngineHarness, fixtures};
//!
//! #[tokio::test]
//! async fn renews() {
//!     partkey_testkit::init_test_tracing();
//!     let harness = EngineHarness::new(1000, 1000);
//!     harness.store.install(fixtures::credential("ALICE", 0, 1500));
//!     let engine = harness.engine();
//!     let outcome = engine
//!         .run_single_renewal(RenewalRequest::new("ALICE", 3000))
//!         .await
//!         .unwrap();
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod assertions;
pub mod fixtures;
mod harness;
mod ledger;
mod signer;
mod store;
mod tracing_config;

pub use assertions::*;
pub use harness::*;
pub use ledger::*;
pub use signer::*;
pub use store::*;
pub use tracing_config::*;

// Re-export core types for convenience
pub use partkey_core::{LifecycleEngine, LifecycleError, LifecycleResult};
