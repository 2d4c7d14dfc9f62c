//! # States
//!
//! One module per reconciliation phase. Each state reads and updates the
//! [`SystemState`](super::fsm::SystemState) and returns the next transition.

pub mod adjust_status;
pub mod cleanup_legacy_service_account;
pub mod configuration_ready;
pub mod deployment;
pub mod deployment_status;
pub mod git_sources;
pub mod metrics_start;
pub mod service;
pub mod validate_function;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;

use crate::crd::Function;

/// Make `function` the controlling owner of an object about to be created
fn set_owner(meta: &mut ObjectMeta, function: &Function) {
    if let Some(owner) = function.controller_owner_ref(&()) {
        meta.owner_references = Some(vec![owner]);
    }
}
