//! # Kubernetes Client
//!
//! The API calls the reconciliation states make, behind a trait so the state machine can
//! run against an in-memory cluster in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;

use crate::constants::CONTROLLER_NAME;
use crate::controller::resources::to_selector;
use crate::crd::{Function, FunctionStatus};

#[async_trait]
pub trait FunctionClient: Send + Sync {
    async fn list_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Deployment>>;
    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment>;
    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment>;
    /// Delete every Deployment in `namespace` carrying `labels`
    async fn delete_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<()>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;
    async fn create_service(&self, service: &Service) -> Result<Service>;
    async fn update_service(&self, service: &Service) -> Result<Service>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;

    /// Replace the status subresource of a Function
    async fn update_function_status(&self, function: &Function, status: &FunctionStatus) -> Result<()>;
}

/// `FunctionClient` backed by the API server
#[derive(Clone)]
pub struct KubeFunctionClient {
    client: Client,
}

impl std::fmt::Debug for KubeFunctionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeFunctionClient").finish_non_exhaustive()
    }
}

impl KubeFunctionClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn namespace_of(meta: &kube::api::ObjectMeta) -> Result<&str> {
    meta.namespace
        .as_deref()
        .context("object has no namespace")
}

fn name_of(meta: &kube::api::ObjectMeta) -> Result<&str> {
    meta.name.as_deref().context("object has no name")
}

#[async_trait]
impl FunctionClient for KubeFunctionClient {
    async fn list_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Deployment>> {
        let params = ListParams::default().labels(&to_selector(labels));
        let list = self
            .deployments(namespace)
            .list(&params)
            .await
            .with_context(|| format!("failed to list Deployments in {namespace}"))?;
        Ok(list.items)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        let namespace = namespace_of(&deployment.metadata)?;
        self.deployments(namespace)
            .create(&PostParams::default(), deployment)
            .await
            .context("failed to create Deployment")
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment> {
        let namespace = namespace_of(&deployment.metadata)?;
        let name = name_of(&deployment.metadata)?;
        self.deployments(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await
            .with_context(|| format!("failed to update Deployment {namespace}/{name}"))
    }

    async fn delete_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<()> {
        let params = ListParams::default().labels(&to_selector(labels));
        self.deployments(namespace)
            .delete_collection(&DeleteParams::background(), &params)
            .await
            .with_context(|| format!("failed to delete Deployments in {namespace}"))?;
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        self.services(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("failed to get Service {namespace}/{name}"))
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        let namespace = namespace_of(&service.metadata)?;
        self.services(namespace)
            .create(&PostParams::default(), service)
            .await
            .context("failed to create Service")
    }

    async fn update_service(&self, service: &Service) -> Result<Service> {
        let namespace = namespace_of(&service.metadata)?;
        let name = name_of(&service.metadata)?;
        self.services(namespace)
            .replace(name, &PostParams::default(), service)
            .await
            .with_context(|| format!("failed to update Service {namespace}/{name}"))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .with_context(|| format!("failed to get Secret {namespace}/{name}"))
    }

    async fn update_function_status(&self, function: &Function, status: &FunctionStatus) -> Result<()> {
        let namespace = namespace_of(&function.metadata)?;
        let name = name_of(&function.metadata)?;
        let patch = serde_json::json!({
            "status": status
        });

        Api::<Function>::namespaced(self.client.clone(), namespace)
            .patch_status(
                name,
                &PatchParams::apply(CONTROLLER_NAME),
                &Patch::Merge(patch),
            )
            .await
            .with_context(|| format!("failed to update status of Function {namespace}/{name}"))?;
        Ok(())
    }
}
