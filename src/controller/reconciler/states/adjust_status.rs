use super::super::fsm::{StateMachine, Transition};
use super::super::types::Requeue;
use crate::controller::resources::{runtime_image, selector_labels, to_selector};
use crate::crd::GitRepositoryStatus;

/// Fill in the derived status fields of a running Function
pub async fn run(m: &mut StateMachine<'_>) -> Transition {
    let function = &m.state.function;
    let deployment = m
        .state
        .cluster_deployment
        .as_ref()
        .or(m.state.built_deployment.as_ref());
    let status = &mut m.state.status;

    status.observed_generation = function.metadata.generation;
    status.runtime = Some(function.spec.runtime.to_string());
    status.runtime_image = deployment.and_then(runtime_image).map(str::to_string);
    status.replicas = Some(
        deployment
            .and_then(|d| d.status.as_ref())
            .and_then(|s| s.replicas)
            .unwrap_or_else(|| function.replicas()),
    );
    status.pod_selector = Some(to_selector(&selector_labels(function)));
    status.function_annotations = function.spec.annotations.clone();
    status.git_repository = function.git_source().map(|git| GitRepositoryStatus {
        url: git.url.clone(),
        base_dir: git.base_dir.clone(),
        reference: git.reference.clone(),
        commit: m.state.commit.clone().unwrap_or_default(),
    });

    Transition::Requeue(Requeue::After(
        m.ctx.function_config.function_ready_requeue_duration,
    ))
}
