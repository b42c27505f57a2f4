//! Collaborator ports consumed by the remediation engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;

use kubemend_domain::{ClusterEvent, NamespaceSummary, PodLogs, PodSummary, ResourceKind};

#[cfg(feature = "testing")]
pub mod testing;

/// Control-plane operations the engine needs. Implementations enforce their own timeouts.
#[async_trait]
pub trait ClusterPort: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSummary>>;

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<PodLogs>;

    async fn delete_pod(&self, namespace: &str, pod: &str) -> Result<()>;

    async fn patch_deployment_replicas(
        &self,
        namespace: &str,
        deployment: &str,
        replicas: i32,
    ) -> Result<()>;

    async fn patch_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<()>;

    async fn create_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        manifest: &serde_json::Value,
    ) -> Result<()>;

    /// Warning/Error events only, newest first.
    async fn list_warning_events(&self, namespace: Option<&str>) -> Result<Vec<ClusterEvent>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Free-text diagnostic completion.
#[async_trait]
pub trait AssistantPort: Send + Sync {
    async fn complete(&self, request: AssistantRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct PortSet {
    pub cluster: Arc<dyn ClusterPort>,
    pub assistant: Arc<dyn AssistantPort>,
}

impl PortSet {
    pub fn new(cluster: Arc<dyn ClusterPort>, assistant: Arc<dyn AssistantPort>) -> Self {
        Self { cluster, assistant }
    }

    pub fn empty() -> Self {
        Self {
            cluster: Arc::new(NullClusterPort),
            assistant: Arc::new(NullAssistantPort),
        }
    }

    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterPort>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn AssistantPort>) -> Self {
        self.assistant = assistant;
        self
    }
}

#[derive(Clone, Default)]
struct NullClusterPort;

#[async_trait]
impl ClusterPort for NullClusterPort {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>> {
        Ok(Vec::new())
    }

    async fn list_pods(&self, _namespace: &str) -> Result<Vec<PodSummary>> {
        Ok(Vec::new())
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        _tail_lines: i64,
    ) -> Result<PodLogs> {
        bail!(
            "no cluster configured to read {}",
            PodLogs::source_for(namespace, pod, container)
        )
    }

    async fn delete_pod(&self, _namespace: &str, _pod: &str) -> Result<()> {
        bail!("no cluster configured")
    }

    async fn patch_deployment_replicas(
        &self,
        _namespace: &str,
        _deployment: &str,
        _replicas: i32,
    ) -> Result<()> {
        bail!("no cluster configured")
    }

    async fn patch_config_map(
        &self,
        _namespace: &str,
        _name: &str,
        _data: &BTreeMap<String, String>,
    ) -> Result<()> {
        bail!("no cluster configured")
    }

    async fn create_resource(
        &self,
        _kind: ResourceKind,
        _namespace: &str,
        _manifest: &serde_json::Value,
    ) -> Result<()> {
        bail!("no cluster configured")
    }

    async fn list_warning_events(&self, _namespace: Option<&str>) -> Result<Vec<ClusterEvent>> {
        Ok(Vec::new())
    }
}

#[derive(Clone, Default)]
struct NullAssistantPort;

#[async_trait]
impl AssistantPort for NullAssistantPort {
    async fn complete(&self, _request: AssistantRequest) -> Result<String> {
        bail!("no diagnostic assistant configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_ports_list_nothing_and_refuse_mutations() {
        let ports = PortSet::empty();
        assert!(ports.cluster.list_namespaces().await.unwrap().is_empty());
        assert!(ports.cluster.list_pods("default").await.unwrap().is_empty());
        assert!(ports.cluster.delete_pod("default", "web").await.is_err());

        let err = ports
            .cluster
            .pod_logs("default", "web", Some("app"), 10)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("default/web/app"));

        let request = AssistantRequest {
            system_prompt: String::new(),
            user_prompt: "logs".into(),
        };
        assert!(ports.assistant.complete(request).await.is_err());
    }
}
