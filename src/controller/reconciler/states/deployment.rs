//! # Function Deployment
//!
//! Get-or-create-or-update of the Function Deployment, plus the cleanup of duplicates
//! carrying the Function's internal labels.

use k8s_openapi::api::apps::v1::Deployment;
use tracing::{error, info, warn};

use super::super::fsm::{State, StateMachine, Transition};
use super::super::types::Requeue;
use super::set_owner;
use crate::constants::{
    CONDITION_FALSE, CONDITION_RUNNING, CONDITION_UNKNOWN, REASON_DEPLOYMENT_CREATED,
    REASON_DEPLOYMENT_DELETED, REASON_DEPLOYMENT_DELETION_FAILED, REASON_DEPLOYMENT_FAILED,
    REASON_DEPLOYMENT_UPDATED, SHORT_REQUEUE,
};
use crate::controller::resources::{
    apply_deployment_changes, deployment_changed, internal_labels, DeploymentBuilder,
};

pub async fn handle(m: &mut StateMachine<'_>) -> Transition {
    let built = DeploymentBuilder::new(&m.state.function, &m.ctx.function_config)
        .commit(m.state.commit.as_deref())
        .git_auth(m.state.git_auth.as_ref())
        .build();
    m.state.built_deployment = Some(built.clone());

    let labels = internal_labels(&m.state.function);
    let mut deployments = match m.ctx.client.list_deployments(m.namespace(), &labels).await {
        Ok(deployments) => deployments,
        Err(e) => {
            error!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Unable to fetch Deployments for Function: {e:#}"
            );
            return Transition::fail(e);
        }
    };

    if deployments.len() > 1 {
        warn!(
            resource.name = m.name(),
            resource.namespace = m.namespace(),
            "Found {} Deployments for Function",
            deployments.len()
        );
        return Transition::Next(State::DeleteDeployments);
    }

    match deployments.pop() {
        None => create(m, built).await,
        Some(current) => update_if_needed(m, current, &built).await,
    }
}

async fn create(m: &mut StateMachine<'_>, mut deployment: Deployment) -> Transition {
    let name = deployment.metadata.name.clone().unwrap_or_default();
    set_owner(&mut deployment.metadata, &m.state.function);
    info!(
        resource.name = m.name(),
        resource.namespace = m.namespace(),
        "Creating Deployment {}",
        name
    );

    match m.ctx.client.create_deployment(&deployment).await {
        Ok(created) => {
            m.state.cluster_deployment = Some(created);
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_UNKNOWN,
                REASON_DEPLOYMENT_CREATED,
                &format!("Deployment {name} created"),
            );
            Transition::Requeue(Requeue::After(m.ctx.function_config.requeue_duration))
        }
        Err(e) => {
            error!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Failed to create Deployment {}: {e:#}",
                name
            );
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_FALSE,
                REASON_DEPLOYMENT_FAILED,
                &format!("Deployment {name} create failed: {e:#}"),
            );
            Transition::fail(e)
        }
    }
}

async fn update_if_needed(
    m: &mut StateMachine<'_>,
    mut current: Deployment,
    built: &Deployment,
) -> Transition {
    if !deployment_changed(&current, built) {
        m.state.cluster_deployment = Some(current);
        return Transition::Next(State::HandleService);
    }

    let name = current.metadata.name.clone().unwrap_or_default();
    apply_deployment_changes(&mut current, built);
    info!(
        resource.name = m.name(),
        resource.namespace = m.namespace(),
        "Updating Deployment {}",
        name
    );

    match m.ctx.client.update_deployment(&current).await {
        Ok(updated) => {
            m.state.cluster_deployment = Some(updated);
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_UNKNOWN,
                REASON_DEPLOYMENT_UPDATED,
                &format!("Deployment {name} updated"),
            );
            Transition::Requeue(Requeue::Immediate)
        }
        Err(e) => {
            error!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Failed to update Deployment {}: {e:#}",
                name
            );
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_FALSE,
                REASON_DEPLOYMENT_FAILED,
                &format!("Deployment {name} update failed: {e:#}"),
            );
            Transition::fail(e)
        }
    }
}

/// Remove every Deployment of the Function, the next run recreates exactly one
pub async fn delete_duplicates(m: &mut StateMachine<'_>) -> Transition {
    info!(
        resource.name = m.name(),
        resource.namespace = m.namespace(),
        "Deleting duplicated Deployments"
    );
    let labels = internal_labels(&m.state.function);

    match m.ctx.client.delete_deployments(m.namespace(), &labels).await {
        Ok(()) => {
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_FALSE,
                REASON_DEPLOYMENT_DELETED,
                "Duplicated Deployments deleted",
            );
            Transition::Requeue(Requeue::After(SHORT_REQUEUE))
        }
        Err(e) => {
            error!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Failed to delete duplicated Deployments: {e:#}"
            );
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_FALSE,
                REASON_DEPLOYMENT_DELETION_FAILED,
                &format!("Failed to delete duplicated Deployments: {e:#}"),
            );
            Transition::fail(e.context("while deleting duplicated deployments"))
        }
    }
}
