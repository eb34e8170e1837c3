//! Structured logging setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use crate::error::{LifecycleError, LifecycleResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Multi-line, human-readable.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// One JSON object per event, with the enclosing renewal span attached.
    Json,
}

/// Logging settings (`[logging]` in the engine configuration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,

    pub format: LogFormat,

    /// Color escapes in pretty and compact output. Ignored for JSON.
    pub ansi: bool,

    /// Log when a renewal or batch span closes, with its elapsed time.
    pub span_timings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            ansi: true,
            span_timings: false,
        }
    }
}

impl LoggingConfig {
    /// Check that `level` parses as a filter directive.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the bad directive.
    pub fn validate(&self) -> LifecycleResult<()> {
        self.level_filter().map(|_| ())
    }

    fn level_filter(&self) -> LifecycleResult<EnvFilter> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            LifecycleError::Config(format!("invalid logging level {:?}: {e}", self.level))
        })
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_target(true)
            .with_span_events(self.span_events());
        match self.format {
            LogFormat::Json => layer.json().with_current_span(true).boxed(),
            LogFormat::Compact => layer.compact().with_ansi(self.ansi).boxed(),
            LogFormat::Pretty => layer.pretty().with_ansi(self.ansi).boxed(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
///
/// Returns a configuration error if `config.level` is not a valid directive or
/// a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> LifecycleResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.level_filter()?,
    };

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(filter)
        .try_init()
        .map_err(|e| LifecycleError::Config(format!("logging init failed: {e}")))
}
