//! # Function Service
//!
//! ClusterIP Service exposing the function pods on port 80.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::labels::{function_labels, selector_labels};
use crate::constants::{FUNCTION_CONTAINER_PORT, FUNCTION_SERVICE_PORT, FUNCTION_SERVICE_PORT_NAME};
use crate::crd::Function;

/// Desired Service of a Function
pub fn build_service(function: &Function) -> Service {
    Service {
        metadata: ObjectMeta {
            name: function.metadata.name.clone(),
            namespace: function.metadata.namespace.clone(),
            labels: Some(function_labels(function)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(FUNCTION_SERVICE_PORT_NAME.to_string()),
                port: FUNCTION_SERVICE_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(FUNCTION_CONTAINER_PORT)),
                ..Default::default()
            }]),
            selector: Some(selector_labels(function)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Whether the cluster Service differs from the desired one in a field the controller owns
///
/// Expects exactly one port on both sides. `clusterIP`, `resourceVersion` and other
/// server-populated fields are ignored.
pub fn service_changed(current: &Service, desired: &Service) -> bool {
    if current.metadata.labels != desired.metadata.labels {
        return true;
    }
    let (Some(current_spec), Some(desired_spec)) = (&current.spec, &desired.spec) else {
        return current.spec.is_some() != desired.spec.is_some();
    };
    if current_spec.selector != desired_spec.selector {
        return true;
    }

    match (
        current_spec.ports.as_deref().unwrap_or_default(),
        desired_spec.ports.as_deref().unwrap_or_default(),
    ) {
        ([current_port], [desired_port]) => {
            current_port.name != desired_port.name
                || current_port.port != desired_port.port
                || current_port.target_port != desired_port.target_port
                || current_port.protocol != desired_port.protocol
        }
        _ => true,
    }
}

/// Copy the managed fields of `desired` into the cluster object
pub fn apply_service_changes(current: &mut Service, desired: &Service) {
    current.metadata.labels.clone_from(&desired.metadata.labels);
    let Some(desired_spec) = desired.spec.as_ref() else {
        return;
    };
    let current_spec = current.spec.get_or_insert_with(ServiceSpec::default);
    current_spec.ports.clone_from(&desired_spec.ports);
    current_spec.selector.clone_from(&desired_spec.selector);
    current_spec.type_.clone_from(&desired_spec.type_);
}
