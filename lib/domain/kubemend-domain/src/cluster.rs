use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub name: String,
    pub status: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

/// Pod lifecycle phase as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    /// Only running and failed pods are swept for errors.
    pub fn is_monitored(self) -> bool {
        matches!(self, PodPhase::Running | PodPhase::Failed)
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    pub containers: Vec<String>,
    pub restart_count: i32,
    pub created: Option<DateTime<Utc>>,
    pub node: Option<String>,
}

/// A log window read from one pod (and optionally one container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodLogs {
    pub logs: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl PodLogs {
    pub fn source_for(namespace: &str, pod: &str, container: Option<&str>) -> String {
        match container {
            Some(container) => format!("{namespace}/{pod}/{container}"),
            None => format!("{namespace}/{pod}"),
        }
    }
}

/// A Warning or Error event from the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub namespace: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub object: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub count: Option<i32>,
}

/// Resource kinds `apply_manifest` knows how to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Deployment,
    Service,
    ConfigMap,
}

impl ResourceKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(ResourceKind::Deployment),
            "Service" => Some(ResourceKind::Service),
            "ConfigMap" => Some(ResourceKind::ConfigMap),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
            ResourceKind::ConfigMap => "ConfigMap",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
