//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port of the metrics and probes server
    pub metrics_port: u16,
    /// Log format (json, text)
    pub log_format: String,
    /// Path of the function configuration YAML file
    pub function_config_path: String,
    /// Bound for each leg of the liveness round-trip (seconds)
    pub health_check_timeout_secs: u64,
    /// How long a reconciliation waits for a commit order before requeueing (milliseconds)
    pub git_order_wait_ms: u64,
    /// Timeout of a single `git ls-remote` call (seconds)
    pub git_ls_remote_timeout_secs: u64,
    /// Requeue interval used by the error policy (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Delay before the watch is restarted after its stream ends (seconds)
    pub watch_restart_delay_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: "json".to_string(),
            function_config_path: DEFAULT_FUNCTION_CONFIG_PATH.to_string(),
            health_check_timeout_secs: DEFAULT_HEALTH_CHECK_TIMEOUT_SECS,
            git_order_wait_ms: DEFAULT_GIT_ORDER_WAIT_MS,
            git_ls_remote_timeout_secs: DEFAULT_GIT_LS_REMOTE_TIMEOUT_SECS,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
            function_config_path: env_var_or_default_str(
                "FUNCTION_CONFIG_PATH",
                DEFAULT_FUNCTION_CONFIG_PATH,
            ),
            health_check_timeout_secs: env_var_or_default(
                "HEALTH_CHECK_TIMEOUT_SECS",
                DEFAULT_HEALTH_CHECK_TIMEOUT_SECS,
            ),
            git_order_wait_ms: env_var_or_default("GIT_ORDER_WAIT_MS", DEFAULT_GIT_ORDER_WAIT_MS),
            git_ls_remote_timeout_secs: env_var_or_default(
                "GIT_LS_REMOTE_TIMEOUT_SECS",
                DEFAULT_GIT_LS_REMOTE_TIMEOUT_SECS,
            ),
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
        }
    }

    /// JSON logs unless `LOG_FORMAT=text`
    pub fn json_logs(&self) -> bool {
        !self.log_format.eq_ignore_ascii_case("text")
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    pub fn git_order_wait(&self) -> Duration {
        Duration::from_millis(self.git_order_wait_ms)
    }

    pub fn git_ls_remote_timeout(&self) -> Duration {
        Duration::from_secs(self.git_ls_remote_timeout_secs)
    }

    /// Get reconciliation error requeue duration
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
