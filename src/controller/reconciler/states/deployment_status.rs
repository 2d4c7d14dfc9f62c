//! # Deployment Status
//!
//! Maps the readiness of the Function Deployment onto the `Running` condition.

use anyhow::anyhow;
use tracing::info;

use super::super::fsm::{State, StateMachine, Transition};
use super::super::readiness::{evaluate, DeploymentReadiness};
use super::super::types::Requeue;
use crate::constants::{
    CONDITION_FALSE, CONDITION_RUNNING, CONDITION_TRUE, CONDITION_UNKNOWN,
    REASON_DEPLOYMENT_FAILED, REASON_DEPLOYMENT_READY, REASON_DEPLOYMENT_WAITING,
    REASON_MIN_REPLICAS_NOT_AVAILABLE, SHORT_REQUEUE,
};
use crate::controller::resources::internal_labels;

pub async fn run(m: &mut StateMachine<'_>) -> Transition {
    let labels = internal_labels(&m.state.function);
    let deployments = match m.ctx.client.list_deployments(m.namespace(), &labels).await {
        Ok(deployments) => deployments,
        Err(e) => {
            return Transition::Fail {
                requeue: Some(Requeue::After(SHORT_REQUEUE)),
                error: e.context("while getting deployments"),
            };
        }
    };

    let count = deployments.len();
    let mut deployments = deployments.into_iter();
    let (Some(deployment), None) = (deployments.next(), deployments.next()) else {
        return Transition::Fail {
            requeue: Some(Requeue::After(SHORT_REQUEUE)),
            error: anyhow!("expected one Deployment for Function {}, found {count}", m.name()),
        };
    };

    let deployment_name = deployment.metadata.name.clone().unwrap_or_default();
    let readiness = evaluate(&deployment);
    info!(
        resource.name = m.name(),
        resource.namespace = m.namespace(),
        readiness = readiness.as_str(),
        "Deployment {} evaluated",
        deployment_name
    );

    let transition = match readiness {
        DeploymentReadiness::Ready => {
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_TRUE,
                REASON_DEPLOYMENT_READY,
                &format!("Deployment {deployment_name} is ready"),
            );
            Transition::Next(State::AdjustStatus)
        }
        DeploymentReadiness::Unhealthy => {
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_UNKNOWN,
                REASON_MIN_REPLICAS_NOT_AVAILABLE,
                &format!("Minimum replicas not available for deployment {deployment_name}"),
            );
            Transition::Requeue(Requeue::After(SHORT_REQUEUE))
        }
        DeploymentReadiness::Waiting => {
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_UNKNOWN,
                REASON_DEPLOYMENT_WAITING,
                &format!("Deployment {deployment_name} is not ready yet"),
            );
            Transition::Requeue(Requeue::After(SHORT_REQUEUE))
        }
        DeploymentReadiness::Failed => {
            let conditions = deployment
                .status
                .as_ref()
                .and_then(|s| s.conditions.clone())
                .unwrap_or_default();
            let yaml = match serde_yaml::to_string(&conditions) {
                Ok(yaml) => yaml,
                Err(e) => {
                    return Transition::fail(
                        anyhow::Error::new(e).context("while parsing deployment status"),
                    )
                }
            };
            m.state.status.update_condition(
                CONDITION_RUNNING,
                CONDITION_FALSE,
                REASON_DEPLOYMENT_FAILED,
                &format!("Deployment {deployment_name} failed with condition: \n{yaml}"),
            );
            Transition::Stop
        }
    };

    m.state.cluster_deployment = Some(deployment);
    transition
}
