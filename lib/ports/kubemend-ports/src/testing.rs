//! In-memory collaborators that record every call.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;

use kubemend_domain::{
    ClusterEvent, NamespaceSummary, PodLogs, PodPhase, PodSummary, ResourceKind,
};

use crate::{AssistantPort, AssistantRequest, ClusterPort};

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterCall {
    ListNamespaces,
    ListPods(String),
    PodLogs {
        namespace: String,
        pod: String,
        container: Option<String>,
        tail_lines: i64,
    },
    DeletePod {
        namespace: String,
        pod: String,
    },
    PatchReplicas {
        namespace: String,
        deployment: String,
        replicas: i32,
    },
    PatchConfigMap {
        namespace: String,
        name: String,
        data: BTreeMap<String, String>,
    },
    CreateResource {
        kind: ResourceKind,
        namespace: String,
        name: Option<String>,
    },
    ListEvents(Option<String>),
}

type LogKey = (String, String, Option<String>);

#[derive(Default)]
struct FakeState {
    namespaces: Vec<String>,
    pods: BTreeMap<String, Vec<PodSummary>>,
    logs: HashMap<LogKey, String>,
    failing_logs: HashSet<LogKey>,
    failing_namespaces: HashSet<String>,
    fail_mutations: bool,
    create_limit: Option<usize>,
    events: Vec<ClusterEvent>,
    calls: Vec<ClusterCall>,
}

/// A scripted cluster.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
    log_delay: Option<Duration>,
}

pub fn pod(namespace: &str, name: &str, phase: PodPhase, containers: &[&str]) -> PodSummary {
    PodSummary {
        name: name.to_string(),
        namespace: namespace.to_string(),
        phase,
        containers: containers.iter().map(|c| c.to_string()).collect(),
        restart_count: 0,
        created: None,
        node: Some("node-1".to_string()),
    }
}

fn key(namespace: &str, pod: &str, container: Option<&str>) -> LogKey {
    (
        namespace.to_string(),
        pod.to_string(),
        container.map(str::to_string),
    )
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(self, namespace: &str) -> Self {
        self.state().namespaces.push(namespace.to_string());
        self
    }

    pub fn with_pod(self, pod: PodSummary) -> Self {
        self.state()
            .pods
            .entry(pod.namespace.clone())
            .or_default()
            .push(pod);
        self
    }

    pub fn with_logs(self, namespace: &str, pod: &str, container: Option<&str>, logs: &str) -> Self {
        self.state()
            .logs
            .insert(key(namespace, pod, container), logs.to_string());
        self
    }

    pub fn with_failing_logs(self, namespace: &str, pod: &str, container: Option<&str>) -> Self {
        self.state()
            .failing_logs
            .insert(key(namespace, pod, container));
        self
    }

    pub fn with_failing_namespace(self, namespace: &str) -> Self {
        self.state().failing_namespaces.insert(namespace.to_string());
        self
    }

    pub fn with_failing_mutations(self) -> Self {
        self.state().fail_mutations = true;
        self
    }

    /// Creates beyond the first `limit` are rejected.
    pub fn with_create_limit(self, limit: usize) -> Self {
        self.state().create_limit = Some(limit);
        self
    }

    pub fn with_event(self, event: ClusterEvent) -> Self {
        self.state().events.push(event);
        self
    }

    /// Every log fetch sleeps this long before answering.
    pub fn with_log_delay(mut self, delay: Duration) -> Self {
        self.log_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&ClusterCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake cluster lock poisoned")
    }

    fn record(&self, call: ClusterCall) {
        self.state().calls.push(call);
    }

    fn mutation(&self, call: ClusterCall) -> Result<()> {
        let mut state = self.state();
        state.calls.push(call);
        if state.fail_mutations {
            bail!("api server rejected the request");
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterPort for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>> {
        self.record(ClusterCall::ListNamespaces);
        Ok(self
            .state()
            .namespaces
            .iter()
            .map(|name| NamespaceSummary {
                name: name.clone(),
                status: Some("Active".to_string()),
                created: None,
            })
            .collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSummary>> {
        let mut state = self.state();
        state.calls.push(ClusterCall::ListPods(namespace.to_string()));
        if state.failing_namespaces.contains(namespace) {
            bail!("connection refused listing pods in {namespace}");
        }
        Ok(state.pods.get(namespace).cloned().unwrap_or_default())
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<PodLogs> {
        self.record(ClusterCall::PodLogs {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            container: container.map(str::to_string),
            tail_lines,
        });
        if let Some(delay) = self.log_delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state();
        let key = key(namespace, pod, container);
        if state.failing_logs.contains(&key) {
            bail!("container {} is not ready", PodLogs::source_for(namespace, pod, container));
        }
        let logs = state.logs.get(&key).cloned().unwrap_or_default();
        Ok(PodLogs {
            logs,
            timestamp: Utc::now(),
            source: PodLogs::source_for(namespace, pod, container),
        })
    }

    async fn delete_pod(&self, namespace: &str, pod: &str) -> Result<()> {
        self.mutation(ClusterCall::DeletePod {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
        })
    }

    async fn patch_deployment_replicas(
        &self,
        namespace: &str,
        deployment: &str,
        replicas: i32,
    ) -> Result<()> {
        self.mutation(ClusterCall::PatchReplicas {
            namespace: namespace.to_string(),
            deployment: deployment.to_string(),
            replicas,
        })
    }

    async fn patch_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.mutation(ClusterCall::PatchConfigMap {
            namespace: namespace.to_string(),
            name: name.to_string(),
            data: data.clone(),
        })
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        manifest: &serde_json::Value,
    ) -> Result<()> {
        let name = manifest
            .pointer("/metadata/name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let mut state = self.state();
        let created = state
            .calls
            .iter()
            .filter(|call| matches!(call, ClusterCall::CreateResource { .. }))
            .count();
        let over_limit = state.create_limit.is_some_and(|limit| created >= limit);
        drop(state);
        self.mutation(ClusterCall::CreateResource {
            kind,
            namespace: namespace.to_string(),
            name,
        })?;
        if over_limit {
            bail!("{kind} already exists");
        }
        Ok(())
    }

    async fn list_warning_events(&self, namespace: Option<&str>) -> Result<Vec<ClusterEvent>> {
        let mut state = self.state();
        state
            .calls
            .push(ClusterCall::ListEvents(namespace.map(str::to_string)));
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|event| namespace.is_none() || event.namespace.as_deref() == namespace)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }
}

/// Returns a fixed completion, or an error when none is set.
#[derive(Default)]
pub struct FakeAssistant {
    response: Option<String>,
    requests: Mutex<Vec<AssistantRequest>>,
}

impl FakeAssistant {
    pub fn replying(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<AssistantRequest> {
        self.requests
            .lock()
            .expect("fake assistant lock poisoned")
            .clone()
    }
}

#[async_trait]
impl AssistantPort for FakeAssistant {
    async fn complete(&self, request: AssistantRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("fake assistant lock poisoned")
            .push(request);
        self.response
            .clone()
            .ok_or_else(|| anyhow!("assistant endpoint unreachable"))
    }
}
