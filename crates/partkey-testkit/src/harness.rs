//! Engine harness wiring every scripted collaborator together.

use std::sync::Arc;

use partkey_core::{EngineConfig, LifecycleEngine};

use crate::fixtures;
use crate::ledger::ScriptedLedger;
use crate::signer::{MemoryArtifactSink, ScriptedSigner};
use crate::store::MemoryCredentialStore;

/// Scripted collaborators plus the engine built over them.
pub struct EngineHarness {
    /// Ledger client.
    pub ledger: Arc<ScriptedLedger>,
    /// Credential store.
    pub store: Arc<MemoryCredentialStore>,
    /// Signer.
    pub signer: Arc<ScriptedSigner>,
    /// Export sink.
    pub sink: Arc<MemoryArtifactSink>,
    max_txn_life: u64,
}

impl EngineHarness {
    /// Harness with the ledger at `round` and the given protocol lifetime.
    #[must_use]
    pub fn new(round: u64, max_txn_life: u64) -> Self {
        Self {
            ledger: Arc::new(ScriptedLedger::at_round(round)),
            store: Arc::new(MemoryCredentialStore::new()),
            signer: Arc::new(ScriptedSigner::new()),
            sink: Arc::new(MemoryArtifactSink::new()),
            max_txn_life,
        }
    }

    /// Build an engine with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the engine cannot be built.
    #[must_use]
    pub fn engine(&self) -> LifecycleEngine {
        self.engine_with_config(EngineConfig::default())
    }

    /// Build an engine with `config`.
    ///
    /// # Panics
    ///
    /// Panics if the engine cannot be built.
    #[must_use]
    pub fn engine_with_config(&self, config: EngineConfig) -> LifecycleEngine {
        LifecycleEngine::builder()
            .ledger(self.ledger.clone())
            .store(self.store.clone())
            .signer(self.signer.clone())
            .sink(self.sink.clone())
            .protocols(fixtures::protocols(self.max_txn_life))
            .config(config)
            .build()
            .expect("harness engine builds")
    }
}
