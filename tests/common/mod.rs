//! Common test utilities for the integration tests
//!
//! Provides an in-memory `FunctionClient`, a counting commit fetcher and Function
//! fixtures shared by all test files.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use function_controller::config::FunctionConfig;
use function_controller::controller::client::FunctionClient;
use function_controller::controller::git::{GitAuth, GitError, LatestCommitFetcher};
use function_controller::controller::reconciler::Reconciler;
use function_controller::crd::{
    Function, FunctionSpec, FunctionStatus, GitRepositorySource, InlineSource, Runtime, Source,
};
use function_controller::observability::Metrics;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "default";
pub const COMMIT: &str = "6b3f2a1c9d8e7f6a5b4c3d2e1f0a9b8c7d6e5f4a";
pub const REPO_URL: &str = "https://github.com/kyma-project/serverless.git";

/// API calls the reconciler made, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListDeployments,
    CreateDeployment(String),
    UpdateDeployment(String),
    DeleteDeployments,
    GetService(String),
    CreateService(String),
    UpdateService(String),
    GetSecret(String),
    UpdateStatus,
}

impl Call {
    /// Writes to Deployments or Services
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::CreateDeployment(_)
                | Call::UpdateDeployment(_)
                | Call::DeleteDeployments
                | Call::CreateService(_)
                | Call::UpdateService(_)
        )
    }
}

/// In-memory cluster
#[derive(Debug, Default)]
pub struct FakeClient {
    pub deployments: Mutex<Vec<Deployment>>,
    pub services: Mutex<Vec<Service>>,
    pub secrets: Mutex<Vec<Secret>>,
    pub statuses: Mutex<Vec<FunctionStatus>>,
    pub calls: Mutex<Vec<Call>>,
    pub fail_create_deployment: Mutex<Option<String>>,
    pub fail_status_update: Mutex<bool>,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_deployment(self: Arc<Self>, deployment: Deployment) -> Arc<Self> {
        self.deployments.lock().unwrap().push(deployment);
        self
    }

    pub fn with_service(self: Arc<Self>, service: Service) -> Arc<Self> {
        self.services.lock().unwrap().push(service);
        self
    }

    pub fn with_secret(self: Arc<Self>, secret: Secret) -> Arc<Self> {
        self.secrets.lock().unwrap().push(secret);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    /// Last status written through the status subresource
    pub fn last_status(&self) -> Option<FunctionStatus> {
        self.statuses.lock().unwrap().last().cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn matches(meta: &ObjectMeta, namespace: &str, labels: &BTreeMap<String, String>) -> bool {
    let object_labels = meta.labels.clone().unwrap_or_default();
    meta.namespace.as_deref() == Some(namespace)
        && labels.iter().all(|(k, v)| object_labels.get(k) == Some(v))
}

fn same_object(a: &ObjectMeta, b: &ObjectMeta) -> bool {
    a.namespace == b.namespace && a.name == b.name
}

#[async_trait]
impl FunctionClient for FakeClient {
    async fn list_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Deployment>> {
        self.record(Call::ListDeployments);
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| matches(&d.metadata, namespace, labels))
            .cloned()
            .collect())
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.record(Call::CreateDeployment(name));
        if let Some(message) = self.fail_create_deployment.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }
        self.deployments.lock().unwrap().push(deployment.clone());
        Ok(deployment.clone())
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.record(Call::UpdateDeployment(name));
        let mut deployments = self.deployments.lock().unwrap();
        let existing = deployments
            .iter_mut()
            .find(|d| same_object(&d.metadata, &deployment.metadata))
            .ok_or_else(|| anyhow!("deployment not found"))?;
        *existing = deployment.clone();
        Ok(deployment.clone())
    }

    async fn delete_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.record(Call::DeleteDeployments);
        self.deployments
            .lock()
            .unwrap()
            .retain(|d| !matches(&d.metadata, namespace, labels));
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        self.record(Call::GetService(name.to_string()));
        Ok(self
            .services
            .lock()
            .unwrap()
            .iter()
            .find(|s| {
                s.metadata.namespace.as_deref() == Some(namespace)
                    && s.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        let name = service.metadata.name.clone().unwrap_or_default();
        self.record(Call::CreateService(name));
        self.services.lock().unwrap().push(service.clone());
        Ok(service.clone())
    }

    async fn update_service(&self, service: &Service) -> Result<Service> {
        let name = service.metadata.name.clone().unwrap_or_default();
        self.record(Call::UpdateService(name));
        let mut services = self.services.lock().unwrap();
        let existing = services
            .iter_mut()
            .find(|s| same_object(&s.metadata, &service.metadata))
            .ok_or_else(|| anyhow!("service not found"))?;
        *existing = service.clone();
        Ok(service.clone())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.record(Call::GetSecret(name.to_string()));
        self.secrets
            .lock()
            .unwrap()
            .iter()
            .find(|s| {
                s.metadata.namespace.as_deref() == Some(namespace)
                    && s.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| anyhow!("secrets \"{name}\" not found"))
    }

    async fn update_function_status(
        &self,
        _function: &Function,
        status: &FunctionStatus,
    ) -> Result<()> {
        self.record(Call::UpdateStatus);
        if *self.fail_status_update.lock().unwrap() {
            return Err(anyhow!("status subresource unavailable"));
        }
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// Fetcher returning a fixed result and counting its calls
#[derive(Debug)]
pub struct CountingFetcher {
    pub calls: AtomicUsize,
    result: Result<String, GitError>,
    delay: Duration,
}

impl CountingFetcher {
    pub fn new(commit: &str) -> Arc<Self> {
        Self::with_result(Ok(commit.to_string()))
    }

    pub fn with_result(result: Result<String, GitError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result,
            delay: Duration::ZERO,
        })
    }

    /// Fetcher that takes `delay` before answering
    pub fn slow(commit: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Ok(commit.to_string()),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LatestCommitFetcher for CountingFetcher {
    async fn latest_commit(
        &self,
        _url: &str,
        _reference: &str,
        _auth: Option<&GitAuth>,
    ) -> Result<String, GitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Fetcher answering per repository url, after a per-url delay
#[derive(Debug, Default)]
pub struct RepoFetcher {
    repos: BTreeMap<String, (String, Duration)>,
}

impl RepoFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo(mut self, url: &str, commit: &str, delay: Duration) -> Self {
        self.repos
            .insert(url.to_string(), (commit.to_string(), delay));
        self
    }
}

#[async_trait]
impl LatestCommitFetcher for RepoFetcher {
    async fn latest_commit(
        &self,
        url: &str,
        _reference: &str,
        _auth: Option<&GitAuth>,
    ) -> Result<String, GitError> {
        let Some((commit, delay)) = self.repos.get(url) else {
            return Err(GitError::ReferenceNotFound);
        };
        tokio::time::sleep(*delay).await;
        Ok(commit.clone())
    }
}

pub fn reconciler(client: Arc<FakeClient>, fetcher: Arc<CountingFetcher>) -> Reconciler {
    Reconciler::new(
        client,
        FunctionConfig::default(),
        fetcher,
        Arc::new(Metrics::new().unwrap()),
        Duration::from_secs(2),
    )
}

fn metadata(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        uid: Some(format!("{name}-uid")),
        generation: Some(1),
        ..Default::default()
    }
}

pub fn inline_function(name: &str, runtime: &str, dependencies: Option<&str>) -> Function {
    let source = if runtime.starts_with("python") {
        "def main(event, context):\n    return 'hello'"
    } else {
        "module.exports = { main: function (event, context) { return 'hello' } }"
    };
    Function {
        metadata: metadata(name),
        spec: FunctionSpec {
            runtime: Runtime::new(runtime),
            source: Source {
                inline: Some(InlineSource {
                    source: source.to_string(),
                    dependencies: dependencies.map(str::to_string),
                }),
                git_repository: None,
            },
            ..Default::default()
        },
        status: None,
    }
}

pub fn git_function(name: &str) -> Function {
    Function {
        metadata: metadata(name),
        spec: FunctionSpec {
            runtime: Runtime::new(Runtime::NODEJS22),
            source: Source {
                inline: None,
                git_repository: Some(GitRepositorySource {
                    url: REPO_URL.to_string(),
                    auth: None,
                    base_dir: "/examples/hello".to_string(),
                    reference: "main".to_string(),
                }),
            },
            ..Default::default()
        },
        status: None,
    }
}

pub fn deployment_condition(type_: &str, status: &str, reason: &str) -> DeploymentCondition {
    DeploymentCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        ..Default::default()
    }
}

/// Copy of `deployment` as the API server reports it once rolled out
pub fn rolled_out(mut deployment: Deployment, conditions: Vec<DeploymentCondition>) -> Deployment {
    deployment.metadata.resource_version = Some("4711".to_string());
    deployment.status = Some(DeploymentStatus {
        replicas: Some(1),
        conditions: Some(conditions),
        ..Default::default()
    });
    deployment
}

pub fn ready_conditions() -> Vec<DeploymentCondition> {
    vec![
        deployment_condition("Available", "True", "MinimumReplicasAvailable"),
        deployment_condition("Progressing", "True", "NewReplicaSetAvailable"),
    ]
}
