//! # Reconciler
//!
//! Converges a `Function` into one Deployment and one Service.
//!
//! A reconciliation is a run of the [`fsm::StateMachine`]:
//!
//! 1. `MetricsStart` - Count the reconciliation
//! 2. `CleanupLegacyServiceAccount` - Reset service accounts of old Deployments
//! 3. `ValidateFunction` - Stop on an invalid spec
//! 4. `HandleGitSources` - Resolve credentials and the latest commit
//! 5. `ConfigurationReady` - Mark the configuration as accepted
//! 6. `HandleDeployment` - Create or update the Deployment (`DeleteDeployments` on duplicates)
//! 7. `HandleService` - Create or update the Service
//! 8. `DeploymentStatus` - Map Deployment readiness onto the `Running` condition
//! 9. `AdjustStatus` - Fill in derived status fields
//!
//! The status is persisted after every state that changed it.

pub mod fsm;
pub mod readiness;
pub mod reconcile;
pub mod states;
pub mod types;
pub mod validation;

pub use fsm::{State, StateMachine, SystemState, Transition};
pub use readiness::DeploymentReadiness;
pub use reconcile::reconcile;
pub use types::{Reconciler, ReconcilerError, Requeue};
