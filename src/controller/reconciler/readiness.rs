//! # Deployment Readiness
//!
//! Classifies a Deployment from its conditions.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentReadiness {
    /// Minimum replicas available and the latest ReplicaSet rolled out
    Ready,
    /// Fewer replicas available than required
    Unhealthy,
    /// Rollout in progress
    Waiting,
    Failed,
}

impl DeploymentReadiness {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentReadiness::Ready => "ready",
            DeploymentReadiness::Unhealthy => "unhealthy",
            DeploymentReadiness::Waiting => "waiting",
            DeploymentReadiness::Failed => "failed",
        }
    }
}

/// First match wins: ready, unhealthy, waiting, otherwise failed
pub fn evaluate(deployment: &Deployment) -> DeploymentReadiness {
    let conditions = deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();
    evaluate_conditions(conditions)
}

pub fn evaluate_conditions(conditions: &[DeploymentCondition]) -> DeploymentReadiness {
    let available = conditions.iter().find(|c| c.type_ == "Available");
    let progressing = conditions.iter().find(|c| c.type_ == "Progressing");

    let is = |condition: Option<&DeploymentCondition>, status: &str, reason: Option<&str>| {
        condition.is_some_and(|c| {
            c.status == status && reason.is_none_or(|r| c.reason.as_deref() == Some(r))
        })
    };

    if is(available, "True", Some("MinimumReplicasAvailable"))
        && is(progressing, "True", Some("NewReplicaSetAvailable"))
    {
        return DeploymentReadiness::Ready;
    }
    if is(available, "False", Some("MinimumReplicasUnavailable")) {
        return DeploymentReadiness::Unhealthy;
    }
    if is(progressing, "True", None) {
        return DeploymentReadiness::Waiting;
    }
    DeploymentReadiness::Failed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(type_: &str, status: &str, reason: &str) -> DeploymentCondition {
        DeploymentCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            reason: Some(reason.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_ready() {
        let conditions = [
            condition("Available", "True", "MinimumReplicasAvailable"),
            condition("Progressing", "True", "NewReplicaSetAvailable"),
        ];
        assert_eq!(evaluate_conditions(&conditions), DeploymentReadiness::Ready);
    }

    #[test]
    fn test_unhealthy_wins_over_progressing() {
        let conditions = [
            condition("Available", "False", "MinimumReplicasUnavailable"),
            condition("Progressing", "True", "ReplicaSetUpdated"),
        ];
        assert_eq!(
            evaluate_conditions(&conditions),
            DeploymentReadiness::Unhealthy
        );
    }

    #[test]
    fn test_waiting() {
        let conditions = [
            condition("Available", "True", "MinimumReplicasAvailable"),
            condition("Progressing", "True", "ReplicaSetUpdated"),
        ];
        assert_eq!(evaluate_conditions(&conditions), DeploymentReadiness::Waiting);
    }

    #[test]
    fn test_failed() {
        let conditions = [
            condition("Available", "True", "MinimumReplicasAvailable"),
            condition("Progressing", "False", "ProgressDeadlineExceeded"),
        ];
        assert_eq!(evaluate_conditions(&conditions), DeploymentReadiness::Failed);
        assert_eq!(evaluate_conditions(&[]), DeploymentReadiness::Failed);
    }
}
