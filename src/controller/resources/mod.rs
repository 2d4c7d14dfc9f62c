//! # Resources
//!
//! Pure builders for the objects a Function runs as, plus the narrow diffs deciding
//! whether a cluster object needs an update.
//!
//! - `labels.rs` - Label sets and selectors
//! - `deployment.rs` - Function Deployment
//! - `service.rs` - Function Service

mod deployment;
mod labels;
mod service;

pub use deployment::{apply_deployment_changes, deployment_changed, runtime_image, DeploymentBuilder};
pub use labels::{function_labels, internal_labels, pod_labels, selector_labels, to_selector};
pub use service::{apply_service_changes, build_service, service_changed};
