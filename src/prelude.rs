//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use function_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (Function, FunctionSpec, FunctionStatus, etc.)
//! - Reconciler types (Reconciler, ReconcilerError, StateMachine, etc.)
//! - The Kubernetes access seam (FunctionClient)
//! - Config types (ControllerConfig, FunctionConfig)

// CRD types - most commonly used
pub use crate::crd::*;

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, Reconciler, ReconcilerError, Requeue, State, StateMachine, SystemState,
};

// Kubernetes access, implemented by the real client and by test fakes
pub use crate::controller::client::FunctionClient;

// Git commit lookup
pub use crate::controller::git::{GitAuth, GitError, LatestCommitFetcher};

// Config types - for configuration management
pub use crate::config::{ControllerConfig, FunctionConfig};

pub use crate::observability::Metrics;
