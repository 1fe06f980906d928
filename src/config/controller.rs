//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Restrict the AgeSecret watch to a single namespace
    /// `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: u16,
    /// Timeout for one native secret API call (seconds)
    pub api_timeout_secs: u64,
    /// Attempts for one native secret API call before giving up
    pub api_max_attempts: u32,
    /// Exponential backoff starting value (milliseconds)
    /// Initial delay before retrying a failed API call
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Permanent failures tolerated before the resource is marked Degraded
    pub max_permanent_failures: u32,
    /// Watch stream restart delay after errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Periodic resync after a successful reconciliation (seconds)
    pub resync_interval_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            watch_namespace: None,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            api_max_attempts: DEFAULT_API_MAX_ATTEMPTS,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            max_permanent_failures: DEFAULT_MAX_PERMANENT_FAILURES,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        use crate::constants::*;
        let max_attempts: u32 = var_or_default(&lookup, "API_MAX_ATTEMPTS", DEFAULT_API_MAX_ATTEMPTS);
        Self {
            metrics_port: var_or_default(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            watch_namespace: lookup("WATCH_NAMESPACE")
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
            max_concurrent_reconciliations: var_or_default(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            api_timeout_secs: var_or_default(&lookup, "API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS),
            // At least one attempt is always made
            api_max_attempts: max_attempts.max(1),
            backoff_start_ms: var_or_default(&lookup, "BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: var_or_default(&lookup, "BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            max_permanent_failures: var_or_default(
                &lookup,
                "MAX_PERMANENT_FAILURES",
                DEFAULT_MAX_PERMANENT_FAILURES,
            ),
            watch_restart_delay_secs: var_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            resync_interval_secs: var_or_default(
                &lookup,
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "json".to_string()),
        }
    }

    /// Get API call timeout duration
    #[must_use]
    pub fn api_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Get backoff start duration
    #[must_use]
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get resync interval duration
    #[must_use]
    pub fn resync_interval_duration(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub fn json_logs(&self) -> bool {
        !self.log_format.eq_ignore_ascii_case("text")
    }
}

/// Read variable or return default value when unset or unparseable
fn var_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
