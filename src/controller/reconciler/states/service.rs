//! # Function Service
//!
//! Get-or-create-or-update of the Service in front of the function pods.

use k8s_openapi::api::core::v1::Service;
use tracing::{error, info};

use super::super::fsm::{State, StateMachine, Transition};
use super::super::types::Requeue;
use super::set_owner;
use crate::constants::{
    CONDITION_FALSE, CONDITION_RUNNING, CONDITION_UNKNOWN, REASON_SERVICE_CREATED,
    REASON_SERVICE_FAILED, REASON_SERVICE_UPDATED,
};
use crate::controller::resources::{apply_service_changes, build_service, service_changed};

pub async fn run(m: &mut StateMachine<'_>) -> Transition {
    let built = build_service(&m.state.function);

    let current = match m.ctx.client.get_service(m.namespace(), m.name()).await {
        Ok(current) => current,
        Err(e) => {
            error!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Unable to fetch Service for Function: {e:#}"
            );
            return Transition::fail(e);
        }
    };

    match current {
        None => create(m, built).await,
        Some(current) if service_changed(&current, &built) => update(m, current, &built).await,
        Some(_) => Transition::Next(State::DeploymentStatus),
    }
}

async fn create(m: &mut StateMachine<'_>, mut service: Service) -> Transition {
    let name = service.metadata.name.clone().unwrap_or_default();
    set_owner(&mut service.metadata, &m.state.function);
    info!(
        resource.name = m.name(),
        resource.namespace = m.namespace(),
        "Creating Service {}",
        name
    );

    if let Err(e) = m.ctx.client.create_service(&service).await {
        error!(
            resource.name = m.name(),
            resource.namespace = m.namespace(),
            "Failed to create Service {}: {e:#}",
            name
        );
        m.state.status.update_condition(
            CONDITION_RUNNING,
            CONDITION_FALSE,
            REASON_SERVICE_FAILED,
            &format!("Service {name} create failed: {e:#}"),
        );
        return Transition::fail(e);
    }

    m.state.status.update_condition(
        CONDITION_RUNNING,
        CONDITION_UNKNOWN,
        REASON_SERVICE_CREATED,
        &format!("Service {name} created"),
    );
    Transition::Requeue(Requeue::After(m.ctx.function_config.requeue_duration))
}

/// Only managed fields are copied over, `clusterIP` is immutable
async fn update(m: &mut StateMachine<'_>, mut current: Service, built: &Service) -> Transition {
    let name = current.metadata.name.clone().unwrap_or_default();
    apply_service_changes(&mut current, built);
    info!(
        resource.name = m.name(),
        resource.namespace = m.namespace(),
        "Updating Service {}",
        name
    );

    if let Err(e) = m.ctx.client.update_service(&current).await {
        error!(
            resource.name = m.name(),
            resource.namespace = m.namespace(),
            "Failed to update Service {}: {e:#}",
            name
        );
        m.state.status.update_condition(
            CONDITION_RUNNING,
            CONDITION_FALSE,
            REASON_SERVICE_FAILED,
            &format!("Service {name} update failed: {e:#}"),
        );
        return Transition::fail(e);
    }

    m.state.status.update_condition(
        CONDITION_RUNNING,
        CONDITION_UNKNOWN,
        REASON_SERVICE_UPDATED,
        &format!("Service {name} updated"),
    );
    Transition::Requeue(Requeue::Immediate)
}
