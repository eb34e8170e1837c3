//! Protocol parameter registry, keyed by consensus version.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{ConsensusVersion, ProtocolParameters};

/// One `[[protocol]]` entry in the engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolEntry {
    /// Consensus version tag.
    pub version: String,
    /// Maximum transaction lifetime in rounds.
    pub max_txn_life: u64,
}

/// Read-only lookup from consensus version to protocol parameters.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    params: HashMap<ConsensusVersion, ProtocolParameters>,
}

impl ProtocolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration entries.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero `max_txn_life` or a duplicate
    /// version tag.
    pub fn from_entries(entries: &[ProtocolEntry]) -> LifecycleResult<Self> {
        let mut registry = Self::new();
        for entry in entries {
            if entry.max_txn_life == 0 {
                return Err(LifecycleError::Config(format!(
                    "protocol {} must have a non-zero max_txn_life",
                    entry.version
                )));
            }
            let version = ConsensusVersion::new(&entry.version);
            if registry.params.contains_key(&version) {
                return Err(LifecycleError::Config(format!(
                    "protocol {} is configured more than once",
                    entry.version
                )));
            }
            registry.insert(ProtocolParameters {
                version,
                max_txn_life: entry.max_txn_life,
            });
        }
        Ok(registry)
    }

    /// Register parameters for a version, replacing any previous entry.
    pub fn insert(&mut self, params: ProtocolParameters) {
        self.params.insert(params.version.clone(), params);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, version: impl Into<String>, max_txn_life: u64) -> Self {
        self.insert(ProtocolParameters {
            version: ConsensusVersion::new(version),
            max_txn_life,
        });
        self
    }

    /// Look up the parameters for `version`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProtocol` if the version is not registered.
    pub fn lookup(&self, version: &ConsensusVersion) -> LifecycleResult<&ProtocolParameters> {
        self.params
            .get(version)
            .ok_or_else(|| LifecycleError::UnknownProtocol(version.clone()))
    }

    /// Number of registered versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no versions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        let registry = ProtocolRegistry::new().with("v1", 1000);
        let params = registry.lookup(&ConsensusVersion::new("v1")).unwrap();
        assert_eq!(params.max_txn_life, 1000);

        let err = registry.lookup(&ConsensusVersion::new("v2")).unwrap_err();
        assert!(matches!(err, LifecycleError::UnknownProtocol(_)));
    }

    #[test]
    fn test_from_entries_rejects_zero_life() {
        let entries = vec![ProtocolEntry {
            version: "v1".into(),
            max_txn_life: 0,
        }];
        assert!(ProtocolRegistry::from_entries(&entries).is_err());
    }

    #[test]
    fn test_from_entries_rejects_duplicates() {
        let entry = ProtocolEntry {
            version: "v1".into(),
            max_txn_life: 10,
        };
        assert!(ProtocolRegistry::from_entries(&[entry.clone(), entry]).is_err());
    }
}
