//! # Custom Resource Definitions
//!
//! CRD types for the Function controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - The `Function` resource, runtimes and sources
//! - `status.rs` - Status and conditions written by the reconciler

mod spec;
mod status;

pub use spec::{
    Function, FunctionSpec, GitRepositorySource, InlineSource, RepositoryAuth,
    RepositoryAuthType, ResourceConfiguration, ResourceRequirementsConfiguration, Runtime,
    SecretMount, Source,
};
pub use status::{Condition, FunctionStatus, GitRepositoryStatus};
