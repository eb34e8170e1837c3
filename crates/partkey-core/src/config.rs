//! Engine configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! default_fee = 0
//! key_dilution = 0
//! wait_mode = "wait-for-confirmation"
//! lapse_policy = "manual-below-horizon"
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ansi = true
//! span_timings = false
//!
//! [[protocol]]
//! version = "future"
//! max_txn_life = 1000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::batch::LapsePolicy;
use crate::error::{LifecycleError, LifecycleResult};
use crate::logging::LoggingConfig;
use crate::poller::WaitMode;
use crate::protocol::{ProtocolEntry, ProtocolRegistry};

/// Defaults and policies applied by the lifecycle engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Fee used when a request does not specify one. Zero means "suggested".
    pub default_fee: u64,

    /// Key dilution used when a request does not specify one. Zero means
    /// "derive from the validity range".
    pub key_dilution: u64,

    /// Wait behavior used when a request does not specify one.
    pub wait_mode: WaitMode,

    /// How batch renewal treats accounts whose credential ends before the
    /// requested horizon.
    pub lapse_policy: LapsePolicy,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Known protocol versions.
    #[serde(rename = "protocol")]
    pub protocols: Vec<ProtocolEntry>,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if parsing or validation fails.
    pub fn from_toml_str(input: &str) -> LifecycleResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or a configuration
    /// error if it is invalid.
    pub fn load(path: impl AsRef<Path>) -> LifecycleResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid protocol entries or an
    /// unparseable logging level.
    pub fn validate(&self) -> LifecycleResult<()> {
        self.logging.validate()?;
        self.protocol_registry().map(|_| ())
    }

    /// Registry seeded from the `[[protocol]]` entries.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero lifetime or duplicate version.
    pub fn protocol_registry(&self) -> LifecycleResult<ProtocolRegistry> {
        ProtocolRegistry::from_entries(&self.protocols)
    }

    /// Resolve a per-request fee against the default.
    #[must_use]
    pub fn fee_or_default(&self, fee: Option<u64>) -> u64 {
        fee.unwrap_or(self.default_fee)
    }

    /// Resolve a per-request dilution against the default.
    #[must_use]
    pub fn dilution_or_default(&self, dilution: Option<u64>) -> u64 {
        dilution.unwrap_or(self.key_dilution)
    }

    /// Resolve a per-request wait mode against the default.
    #[must_use]
    pub fn wait_mode_or_default(&self, wait_mode: Option<WaitMode>) -> WaitMode {
        wait_mode.unwrap_or(self.wait_mode)
    }
}

impl std::str::FromStr for EngineConfig {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use crate::types::ConsensusVersion;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.wait_mode, WaitMode::WaitForConfirmation);
        assert_eq!(config.lapse_policy, LapsePolicy::ManualBelowHorizon);
    }

    #[test]
    fn test_full_config() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_fee = 2000
            key_dilution = 100
            wait_mode = "fire-and-forget"
            lapse_policy = "manual-when-expired"

            [logging]
            level = "debug"
            format = "json"
            span_timings = true

            [[protocol]]
            version = "v1"
            max_txn_life = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.default_fee, 2000);
        assert_eq!(config.wait_mode, WaitMode::FireAndForget);
        assert_eq!(config.lapse_policy, LapsePolicy::ManualWhenExpired);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.logging.span_timings);
        assert!(config.logging.ansi);

        let registry = config.protocol_registry().unwrap();
        let params = registry.lookup(&ConsensusVersion::new("v1")).unwrap();
        assert_eq!(params.max_txn_life, 1000);
    }

    #[test]
    fn test_bad_logging_level_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [logging]
            level = "partkey_core=loud"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Config(_)));
    }

    #[test]
    fn test_unknown_logging_format_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [logging]
            format = "xml"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Config(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EngineConfig::from_toml_str("no_wait = true").unwrap_err();
        assert!(matches!(err, LifecycleError::Config(_)));
    }

    #[test]
    fn test_zero_max_txn_life_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [[protocol]]
            version = "v1"
            max_txn_life = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Config(_)));
    }

    #[test]
    fn test_request_overrides() {
        let config = EngineConfig {
            default_fee: 10,
            ..EngineConfig::default()
        };
        assert_eq!(config.fee_or_default(None), 10);
        assert_eq!(config.fee_or_default(Some(0)), 0);
        assert_eq!(
            config.wait_mode_or_default(Some(WaitMode::FireAndForget)),
            WaitMode::FireAndForget
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partkey.toml");
        std::fs::write(&path, "key_dilution = 64\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.key_dilution, 64);
    }
}
