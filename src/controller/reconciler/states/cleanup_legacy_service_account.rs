//! Deployments created by earlier releases ran under a dedicated service account. Those
//! are moved back to `default` without a mounted token. Failures never block the run.

use tracing::{error, info};

use super::super::fsm::{State, StateMachine, Transition};
use crate::controller::resources::internal_labels;

const DEFAULT_SERVICE_ACCOUNT: &str = "default";

pub async fn run(m: &mut StateMachine<'_>) -> Transition {
    let labels = internal_labels(&m.state.function);
    let deployments = match m.ctx.client.list_deployments(m.namespace(), &labels).await {
        Ok(deployments) => deployments,
        Err(e) => {
            error!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Failed to list Deployments for cleaning up legacy service account name: {e:#}"
            );
            return Transition::Next(State::ValidateFunction);
        }
    };

    for mut deployment in deployments {
        let Some(pod) = deployment
            .spec
            .as_mut()
            .and_then(|spec| spec.template.spec.as_mut())
        else {
            continue;
        };
        match pod.service_account_name.as_deref() {
            None | Some("" | DEFAULT_SERVICE_ACCOUNT) => continue,
            Some(_) => {}
        }
        pod.service_account_name = Some(DEFAULT_SERVICE_ACCOUNT.to_string());
        pod.automount_service_account_token = Some(false);

        let deployment_name = deployment.metadata.name.clone().unwrap_or_default();
        info!(
            resource.name = m.name(),
            resource.namespace = m.namespace(),
            "Cleaning up legacy service account from Deployment {}",
            deployment_name
        );
        match m.ctx.client.update_deployment(&deployment).await {
            Ok(_) => info!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Deployment {} updated with default service account",
                deployment_name
            ),
            Err(e) => error!(
                resource.name = m.name(),
                resource.namespace = m.namespace(),
                "Failed to clean up legacy service account from Deployment {}: {e:#}",
                deployment_name
            ),
        }
    }

    Transition::Next(State::ValidateFunction)
}
