//! # Validation
//!
//! Checks applied to a Function before anything is deployed. Each check returns
//! human-readable messages, an empty list means the Function is valid.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::constants::{RESERVED_ENV_NAMES, RESERVED_LABEL_PREFIX};
use crate::crd::Function;

static ENV_NAME_REGEX: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[-._a-zA-Z][-._a-zA-Z0-9]*$"));

const ENV_NAME_ERROR: &str = "a valid environment variable name must consist of alphabetic characters, digits, '_', '-', or '.', and must not start with a digit (e.g. 'my.env-name', or 'MY_ENV.NAME', or 'MyEnv1', regex used for validation is '[-._a-zA-Z][-._a-zA-Z0-9]*')";

/// Run every check and collect all messages
pub fn validate_function(function: &Function) -> Vec<String> {
    let mut messages = Vec::new();
    messages.extend(validate_envs(function));
    messages.extend(validate_metadata_keys("spec.labels", function.spec.labels.as_ref()));
    messages.extend(validate_metadata_keys(
        "spec.annotations",
        function.spec.annotations.as_ref(),
    ));
    messages.extend(validate_runtime_and_dependencies(function));
    messages
}

/// Env names must be valid and not owned by the runtime, the first offender is reported
pub fn validate_envs(function: &Function) -> Vec<String> {
    for env in &function.spec.env {
        if !is_env_var_name(&env.name) {
            return vec![format!("spec.env: {}. Err: {}", env.name, ENV_NAME_ERROR)];
        }
        if RESERVED_ENV_NAMES.contains(&env.name.as_str()) {
            return vec![format!("spec.env: {}. Err: name is reserved", env.name)];
        }
    }
    Vec::new()
}

fn is_env_var_name(name: &str) -> bool {
    match ENV_NAME_REGEX.as_ref() {
        Ok(regex) => regex.is_match(name),
        Err(_) => false,
    }
}

fn validate_metadata_keys(path: &str, map: Option<&BTreeMap<String, String>>) -> Vec<String> {
    map.into_iter()
        .flat_map(BTreeMap::keys)
        .filter(|key| key.starts_with(RESERVED_LABEL_PREFIX))
        .map(|key| format!("{path}: {key}. Err: key prefix {RESERVED_LABEL_PREFIX} is reserved"))
        .collect()
}

/// Runtime must be known and inline nodejs dependencies must be a JSON object
pub fn validate_runtime_and_dependencies(function: &Function) -> Vec<String> {
    let runtime = &function.spec.runtime;
    if !runtime.is_known() {
        return vec![format!("cannot find runtime: {runtime}")];
    }
    let Some(inline) = function.inline_source() else {
        return Vec::new();
    };
    if !runtime.is_nodejs() {
        return Vec::new();
    }

    let dependencies = inline.dependencies.as_deref().unwrap_or_default().trim();
    if !dependencies.is_empty() && !(dependencies.starts_with('{') && dependencies.ends_with('}'))
    {
        return vec![
            "invalid source.inline.dependencies value: deps should start with '{' and end with '}'"
                .to_string(),
        ];
    }
    Vec::new()
}
