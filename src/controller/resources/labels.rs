//! # Labels
//!
//! Label sets stamped on the objects produced for a Function.

use std::collections::BTreeMap;

use crate::constants::{
    CONTROLLER_NAME, FUNCTION_MANAGED_BY_LABEL, FUNCTION_NAME_LABEL, FUNCTION_RESOURCE_LABEL,
    FUNCTION_RESOURCE_LABEL_DEPLOYMENT_VALUE, FUNCTION_UUID_LABEL, K8S_APP_NAME_LABEL,
};
use crate::crd::Function;

/// Labels identifying the Function's objects, used for lookups
pub fn internal_labels(function: &Function) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            FUNCTION_NAME_LABEL.to_string(),
            function.metadata.name.clone().unwrap_or_default(),
        ),
        (
            FUNCTION_MANAGED_BY_LABEL.to_string(),
            CONTROLLER_NAME.to_string(),
        ),
        (
            FUNCTION_UUID_LABEL.to_string(),
            function.metadata.uid.clone().unwrap_or_default(),
        ),
    ])
}

/// Labels of the Deployment and Service, the Function's own labels plus the internal ones
pub fn function_labels(function: &Function) -> BTreeMap<String, String> {
    let mut labels = function.metadata.labels.clone().unwrap_or_default();
    labels.extend(internal_labels(function));
    labels
}

/// Pod selector of the function Deployment and Service
pub fn selector_labels(function: &Function) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([(
        FUNCTION_RESOURCE_LABEL.to_string(),
        FUNCTION_RESOURCE_LABEL_DEPLOYMENT_VALUE.to_string(),
    )]);
    labels.extend(internal_labels(function));
    labels
}

/// Labels of the function pods
pub fn pod_labels(function: &Function) -> BTreeMap<String, String> {
    let mut labels = function.spec.labels.clone().unwrap_or_default();
    labels.extend(selector_labels(function));
    labels.insert(
        K8S_APP_NAME_LABEL.to_string(),
        function.metadata.name.clone().unwrap_or_default(),
    );
    labels
}

/// `k=v` pairs joined with commas, usable as a label selector string
pub fn to_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}
