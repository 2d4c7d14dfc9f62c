//! # Function Spec
//!
//! The `Function` custom resource and its spec types.

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::FunctionStatus;

/// A serverless function run from inline code or a git repository
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, Default)]
#[kube(
    kind = "Function",
    group = "serverless.kyma-project.io",
    version = "v1alpha2",
    namespaced,
    status = "FunctionStatus",
    shortname = "fn",
    printcolumn = r#"{"name":"Configured", "type":"string", "jsonPath":".status.conditions[?(@.type==\"ConfigurationReady\")].status"}, {"name":"Running", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Running\")].status"}, {"name":"Runtime", "type":"string", "jsonPath":".spec.runtime"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    /// Runtime the function code is executed with (nodejs20, nodejs22, python312)
    pub runtime: Runtime,
    /// Image used instead of the configured runtime image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_image_override: Option<String>,
    pub source: Source,
    /// Environment variables passed to the function container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "preserve_unknown_array")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_configuration: Option<ResourceConfiguration>,
    /// Number of function pods, 1 when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Secrets mounted read-only into the function container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_mounts: Vec<SecretMount>,
    /// Labels added to the function pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    /// Annotations added to the function pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Runtime identifier
///
/// Kept as a plain string so that Functions with retired or unknown runtimes still
/// deserialize and can be reported through their status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema, Default)]
#[serde(transparent)]
pub struct Runtime(pub String);

impl Runtime {
    pub const NODEJS20: &'static str = "nodejs20";
    pub const NODEJS22: &'static str = "nodejs22";
    pub const PYTHON312: &'static str = "python312";

    const SUPPORTED: [&'static str; 3] = [Self::NODEJS20, Self::NODEJS22, Self::PYTHON312];
    const DEPRECATED: [&'static str; 5] = ["nodejs12", "nodejs14", "nodejs16", "nodejs18", "python39"];

    pub fn new(runtime: impl Into<String>) -> Self {
        Self(runtime.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_nodejs(&self) -> bool {
        self.0.starts_with("nodejs")
    }

    #[must_use]
    pub fn is_python(&self) -> bool {
        self.0.starts_with("python")
    }

    /// Runtime has a configured image
    #[must_use]
    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(&self.0.as_str())
    }

    /// Runtime is retired but still accepted
    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        Self::DEPRECATED.contains(&self.0.as_str())
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        self.is_supported() || self.is_deprecated()
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Runtime {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Function source, exactly one variant is expected to be set
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repository: Option<GitRepositorySource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<InlineSource>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineSource {
    /// Handler code
    pub source: String,
    /// package.json for nodejs, requirements.txt for python
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<RepositoryAuth>,
    /// Directory inside the repository holding the handler
    #[serde(default)]
    pub base_dir: String,
    /// Branch or tag
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryAuth {
    pub r#type: RepositoryAuthType,
    pub secret_name: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryAuthType {
    Basic,
    Key,
}

impl RepositoryAuthType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryAuthType::Basic => "basic",
            RepositoryAuthType::Key => "key",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<ResourceRequirementsConfiguration>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirementsConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretMount {
    pub secret_name: String,
    pub mount_path: String,
}

// k8s-openapi types carry no JsonSchema impl, the API server keeps their fields as-is
fn preserve_unknown_object(_gen: &mut SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": "object",
        "nullable": true,
        "x-kubernetes-preserve-unknown-fields": true
    })
}

fn preserve_unknown_array(_gen: &mut SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": "array",
        "items": {
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true
        }
    })
}

impl Function {
    /// Git source of the function, if any
    #[must_use]
    pub fn git_source(&self) -> Option<&GitRepositorySource> {
        self.spec.source.git_repository.as_ref()
    }

    #[must_use]
    pub fn inline_source(&self) -> Option<&InlineSource> {
        self.spec.source.inline.as_ref()
    }

    #[must_use]
    pub fn has_git_source(&self) -> bool {
        self.spec.source.git_repository.is_some()
    }

    /// Requested replicas, defaulting to one
    #[must_use]
    pub fn replicas(&self) -> i32 {
        self.spec
            .replicas
            .unwrap_or(crate::constants::DEFAULT_REPLICAS)
    }

    /// `continuousGitCheckout` annotation is set to true
    #[must_use]
    pub fn continuous_git_checkout(&self) -> bool {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(crate::constants::CONTINUOUS_GIT_CHECKOUT_ANNOTATION))
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}
