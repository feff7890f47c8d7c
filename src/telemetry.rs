//! Global `tracing` subscriber for the monitor binary and embedders.

use crate::config::MonitorConfig;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How the subscriber formats and filters events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter directives used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"trade_event_monitor=debug,warn"`.
    pub log_filter: String,
    pub ansi: bool,
    /// Prefix lines with the emitting module.
    pub show_target: bool,
}

impl TelemetryConfig {
    #[must_use]
    pub fn with_filter(log_filter: impl Into<String>) -> Self {
        Self {
            log_filter: log_filter.into(),
            ..Self::default()
        }
    }

    /// Uses the monitor's configured log level for this crate only, keeping
    /// dependencies at `warn`.
    #[must_use]
    pub fn from_monitor(config: &MonitorConfig) -> Self {
        Self::with_filter(format!("warn,trade_event_monitor={}", config.log_level))
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_filter))
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            ansi: true,
            show_target: false,
        }
    }
}

/// Returned by [`init_telemetry`]; hold it for the life of the process.
#[must_use = "dropping the guard right away is harmless but usually a mistake"]
pub struct TelemetryGuard {
    installed: bool,
}

impl TelemetryGuard {
    /// Whether this process's subscriber was installed by the monitor.
    pub fn installed(&self) -> bool {
        self.installed
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.installed {
            tracing::debug!("Telemetry shut down");
        }
    }
}

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Installs the global subscriber once. `RUST_LOG` overrides
/// `config.log_filter`. Later calls, or a subscriber installed by someone
/// else (e.g. a test harness), leave the existing one in place.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let installed = *INSTALLED.get_or_init(|| {
        let layer = fmt::layer()
            .with_target(config.show_target)
            .with_ansi(config.ansi);
        tracing_subscriber::registry()
            .with(config.env_filter())
            .with(layer)
            .try_init()
            .is_ok()
    });
    TelemetryGuard { installed }
}
