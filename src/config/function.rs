//! # Function Configuration
//!
//! Runtime images, requeue intervals and workload wiring shared by every Function.
//! Loaded once at start-up from a YAML file.

use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::constants::{
    DEFAULT_FUNCTION_READY_REQUEUE_DURATION, DEFAULT_PACKAGE_REGISTRY_CONFIG_SECRET_NAME,
    DEFAULT_PUBLISHER_PROXY_ADDRESS, DEFAULT_REQUEUE_DURATION, DEFAULT_TRACE_COLLECTOR_ENDPOINT,
};
use crate::crd::Runtime;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read function config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse function config {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Settings applied to every Function
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionConfig {
    pub images: RuntimeImages,
    /// Requeue after a workload was created
    #[serde(deserialize_with = "deserialize_duration")]
    pub requeue_duration: Duration,
    /// Requeue once a Function is ready, also the lifetime of cached commits
    #[serde(deserialize_with = "deserialize_duration")]
    pub function_ready_requeue_duration: Duration,
    pub package_registry_config_secret_name: String,
    pub function_publisher_proxy_address: String,
    pub function_trace_collector_endpoint: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeImages {
    pub nodejs20: String,
    pub nodejs22: String,
    pub python312: String,
}

impl Default for RuntimeImages {
    fn default() -> Self {
        Self {
            nodejs20: "europe-docker.pkg.dev/kyma-project/prod/function-runtime-nodejs20:main"
                .to_string(),
            nodejs22: "europe-docker.pkg.dev/kyma-project/prod/function-runtime-nodejs22:main"
                .to_string(),
            python312: "europe-docker.pkg.dev/kyma-project/prod/function-runtime-python312:main"
                .to_string(),
        }
    }
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            images: RuntimeImages::default(),
            requeue_duration: DEFAULT_REQUEUE_DURATION,
            function_ready_requeue_duration: DEFAULT_FUNCTION_READY_REQUEUE_DURATION,
            package_registry_config_secret_name: DEFAULT_PACKAGE_REGISTRY_CONFIG_SECRET_NAME
                .to_string(),
            function_publisher_proxy_address: DEFAULT_PUBLISHER_PROXY_ADDRESS.to_string(),
            function_trace_collector_endpoint: DEFAULT_TRACE_COLLECTOR_ENDPOINT.to_string(),
        }
    }
}

impl FunctionConfig {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Function config {} not found, using defaults", path_str);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path_str,
                    source,
                })
            }
        };
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Configured image for a runtime, `None` for runtimes without an image
    #[must_use]
    pub fn runtime_image(&self, runtime: &Runtime) -> Option<&str> {
        match runtime.as_str() {
            Runtime::NODEJS20 => Some(&self.images.nodejs20),
            Runtime::NODEJS22 => Some(&self.images.nodejs22),
            Runtime::PYTHON312 => Some(&self.images.python312),
            _ => None,
        }
    }
}

static DURATION_REGEX: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(?P<number>\d+)(?P<unit>ms|[smhd])$"));

/// Parse a duration string such as "30s", "1m", "5m" or "1h"
pub fn parse_duration(duration_str: &str) -> Result<Duration, String> {
    let trimmed = duration_str.trim().to_lowercase();
    let regex = DURATION_REGEX
        .as_ref()
        .map_err(|e| format!("failed to compile duration regex: {e}"))?;

    let captures = regex.captures(&trimmed).ok_or_else(|| {
        format!("invalid duration format '{duration_str}', expected <number><unit> (e.g. '1m', '5m', '1h')")
    })?;
    let number: u64 = captures["number"]
        .parse()
        .map_err(|e| format!("invalid duration number in '{duration_str}': {e}"))?;

    let seconds_per_unit = match &captures["unit"] {
        "ms" => return Ok(Duration::from_millis(number)),
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => 86400,
    };
    number
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{duration_str}' is out of range"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
