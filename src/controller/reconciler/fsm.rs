//! # State Machine
//!
//! Drives one reconciliation of a Function through its states.
//!
//! Every state returns a [`Transition`]. After each state the Function status is written
//! back when it differs from the last persisted snapshot, so the user sees progress even
//! when a later state fails.

use k8s_openapi::api::apps::v1::Deployment;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::states;
use super::types::{Reconciler, ReconcilerError, Requeue};
use crate::controller::git::GitAuth;
use crate::crd::{Function, FunctionStatus};

/// Reconciliation phases, in the order they usually run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    MetricsStart,
    CleanupLegacyServiceAccount,
    ValidateFunction,
    HandleGitSources,
    ConfigurationReady,
    HandleDeployment,
    DeleteDeployments,
    HandleService,
    DeploymentStatus,
    AdjustStatus,
}

impl State {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            State::MetricsStart => "MetricsStart",
            State::CleanupLegacyServiceAccount => "CleanupLegacyServiceAccount",
            State::ValidateFunction => "ValidateFunction",
            State::HandleGitSources => "HandleGitSources",
            State::ConfigurationReady => "ConfigurationReady",
            State::HandleDeployment => "HandleDeployment",
            State::DeleteDeployments => "DeleteDeployments",
            State::HandleService => "HandleService",
            State::DeploymentStatus => "DeploymentStatus",
            State::AdjustStatus => "AdjustStatus",
        }
    }

    async fn run(self, m: &mut StateMachine<'_>) -> Transition {
        match self {
            State::MetricsStart => states::metrics_start::run(m).await,
            State::CleanupLegacyServiceAccount => {
                states::cleanup_legacy_service_account::run(m).await
            }
            State::ValidateFunction => states::validate_function::run(m).await,
            State::HandleGitSources => states::git_sources::run(m).await,
            State::ConfigurationReady => states::configuration_ready::run(m).await,
            State::HandleDeployment => states::deployment::handle(m).await,
            State::DeleteDeployments => states::deployment::delete_duplicates(m).await,
            State::HandleService => states::service::run(m).await,
            State::DeploymentStatus => states::deployment_status::run(m).await,
            State::AdjustStatus => states::adjust_status::run(m).await,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single state
#[derive(Debug)]
pub enum Transition {
    Next(State),
    /// End the run and schedule the Function again
    Requeue(Requeue),
    /// End the run, nothing left to do until the Function changes
    Stop,
    Fail {
        requeue: Option<Requeue>,
        error: anyhow::Error,
    },
}

impl Transition {
    pub fn fail(error: anyhow::Error) -> Self {
        Transition::Fail {
            requeue: None,
            error,
        }
    }

    pub fn into_parts(self) -> (Option<State>, Option<Requeue>, Option<anyhow::Error>) {
        match self {
            Transition::Next(state) => (Some(state), None, None),
            Transition::Requeue(requeue) => (None, Some(requeue), None),
            Transition::Stop => (None, None, None),
            Transition::Fail { requeue, error } => (None, requeue, Some(error)),
        }
    }
}

/// Working set of one reconciliation
#[derive(Debug)]
pub struct SystemState {
    pub function: Function,
    /// Status being built up by the states
    pub status: FunctionStatus,
    status_snapshot: FunctionStatus,
    pub built_deployment: Option<Deployment>,
    pub cluster_deployment: Option<Deployment>,
    pub commit: Option<String>,
    pub git_auth: Option<GitAuth>,
}

impl SystemState {
    fn new(function: Function) -> Self {
        let status = function.status.clone().unwrap_or_default();
        Self {
            function,
            status_snapshot: status.clone(),
            status,
            built_deployment: None,
            cluster_deployment: None,
            commit: None,
            git_auth: None,
        }
    }

    fn status_changed(&self) -> bool {
        self.status != self.status_snapshot
    }

    fn save_status_snapshot(&mut self) {
        self.status_snapshot = self.status.clone();
        self.function.status = Some(self.status.clone());
    }
}

pub struct StateMachine<'a> {
    pub ctx: &'a Reconciler,
    pub state: SystemState,
    next: Option<State>,
}

impl std::fmt::Debug for StateMachine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("next", &self.next)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a> StateMachine<'a> {
    pub fn new(ctx: &'a Reconciler, function: Function) -> Self {
        Self::starting_at(ctx, function, State::MetricsStart)
    }

    pub fn starting_at(ctx: &'a Reconciler, function: Function, state: State) -> Self {
        Self {
            ctx,
            state: SystemState::new(function),
            next: Some(state),
        }
    }

    pub fn name(&self) -> &str {
        self.state.function.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.state
            .function
            .metadata
            .namespace
            .as_deref()
            .unwrap_or_default()
    }

    /// UID of the Function, `namespace/name` for objects that were never persisted
    pub fn uid(&self) -> String {
        self.state
            .function
            .metadata
            .uid
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.namespace(), self.name()))
    }

    /// Run states until one ends the reconciliation
    ///
    /// Returns the requeue policy of the last state. Errors carry the requeue delay the
    /// failing state asked for, if any.
    pub async fn run(mut self) -> Result<Option<Requeue>, ReconcilerError> {
        let started = Instant::now();
        let mut requeue = None;
        let mut error = None;

        while let Some(state) = self.next.take() {
            if self.ctx.cancel.is_cancelled() {
                warn!(
                    resource.name = self.name(),
                    resource.namespace = self.namespace(),
                    state = state.as_str(),
                    "Reconciliation cancelled"
                );
                error = Some(ReconcilerError::Cancelled);
                break;
            }

            info!(
                resource.name = self.name(),
                resource.namespace = self.namespace(),
                state = state.as_str(),
                "switching state"
            );
            let (next, state_requeue, state_error) = state.run(&mut self).await.into_parts();
            self.next = next;
            requeue = state_requeue;
            error = state_error.map(|source| match state_requeue {
                Some(after) => ReconcilerError::Retry {
                    after: after.delay(),
                    source,
                },
                None => ReconcilerError::ReconciliationFailed(source),
            });

            if let Err(e) = self.persist_status().await {
                // A failed state keeps its own error
                match &error {
                    Some(state_error) => warn!(
                        resource.name = self.name(),
                        resource.namespace = self.namespace(),
                        state = state.as_str(),
                        "Failed to update Function status after {}: {:#}",
                        state_error,
                        e
                    ),
                    None => error = Some(ReconcilerError::StatusUpdate(e)),
                }
            }
            if error.is_some() {
                break;
            }
        }

        info!(
            resource.name = self.name(),
            resource.namespace = self.namespace(),
            requeue = ?requeue,
            error = error.as_ref().map(tracing::field::display),
            "reconciliation done"
        );
        self.ctx.metrics.observe_reconciliation_duration(
            self.state.function.spec.runtime.as_str(),
            started.elapsed(),
        );

        match error {
            Some(e) => Err(e),
            None => Ok(requeue),
        }
    }

    async fn persist_status(&mut self) -> anyhow::Result<()> {
        if !self.state.status_changed() {
            return Ok(());
        }
        debug!(
            resource.name = self.name(),
            resource.namespace = self.namespace(),
            "Updating Function status"
        );
        let result = self
            .ctx
            .client
            .update_function_status(&self.state.function, &self.state.status)
            .await;
        self.state.save_status_snapshot();
        result
    }
}
