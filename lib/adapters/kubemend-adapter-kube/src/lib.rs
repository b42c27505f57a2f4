//! Cluster port backed by the Kubernetes API server.

mod mapping;

use std::collections::BTreeMap;
use std::fmt::Debug;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Namespace, Pod, Service};
use kube::api::{Api, DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use kubemend_domain::{
    ClusterConfig, ClusterEvent, NamespaceSummary, PodLogs, PodSummary, ResourceKind,
};
use kubemend_ports::ClusterPort;

pub use mapping::{cluster_event, is_warning, namespace_summary, newest_first, pod_summary};

const FIELD_MANAGER: &str = "kubemend";

#[derive(Clone)]
pub struct KubeClusterPort {
    client: Client,
}

impl KubeClusterPort {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from an explicit kubeconfig/context, or the ambient
    /// configuration (in-cluster or `~/.kube/config`).
    pub async fn connect(config: &ClusterConfig) -> Result<Self> {
        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..Default::default()
        };
        let client_config = match &config.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("reading kubeconfig {}", path.display()))?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("loading kubeconfig")?
            }
            None if config.context.is_some() => kube::Config::from_kubeconfig(&options)
                .await
                .context("loading kubeconfig")?,
            None => kube::Config::infer()
                .await
                .context("inferring cluster configuration")?,
        };
        info!(cluster_url = %client_config.cluster_url, "connecting to cluster");
        let client = Client::try_from(client_config).context("building cluster client")?;
        Ok(Self::new(client))
    }

    async fn create<K>(&self, namespace: &str, manifest: &serde_json::Value) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned + Serialize,
        <K as Resource>::DynamicType: Default,
    {
        let resource: K = serde_json::from_value(manifest.clone())
            .with_context(|| format!("decoding {}", K::kind(&Default::default())))?;
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.create(&params, &resource).await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterPort for KubeClusterPort {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .context("listing namespaces")?;
        Ok(list.items.iter().map(namespace_summary).collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSummary>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("listing pods in {namespace}"))?;
        Ok(list.items.iter().map(pod_summary).collect())
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<PodLogs> {
        let source = PodLogs::source_for(namespace, pod, container);
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: container.map(str::to_string),
            tail_lines: Some(tail_lines),
            timestamps: true,
            ..Default::default()
        };
        debug!(%source, tail_lines, "reading logs");
        let logs = api
            .logs(pod, &params)
            .await
            .with_context(|| format!("reading logs of {source}"))?;
        Ok(PodLogs {
            logs,
            timestamp: Utc::now(),
            source,
        })
    }

    async fn delete_pod(&self, namespace: &str, pod: &str) -> Result<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.delete(pod, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn patch_deployment_replicas(
        &self,
        namespace: &str,
        deployment: &str,
        replicas: i32,
    ) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "spec": { "replicas": replicas } });
        api.patch(deployment, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "data": data });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        manifest: &serde_json::Value,
    ) -> Result<()> {
        match kind {
            ResourceKind::Deployment => self.create::<Deployment>(namespace, manifest).await,
            ResourceKind::Service => self.create::<Service>(namespace, manifest).await,
            ResourceKind::ConfigMap => self.create::<ConfigMap>(namespace, manifest).await,
        }
    }

    async fn list_warning_events(&self, namespace: Option<&str>) -> Result<Vec<ClusterEvent>> {
        let api: Api<Event> = match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        let list = api
            .list(&ListParams::default())
            .await
            .context("listing events")?;
        let events = list
            .items
            .iter()
            .filter(|event| is_warning(event))
            .map(cluster_event)
            .collect();
        Ok(newest_first(events))
    }
}
