use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::suggestion::Suggestion;
use crate::target::ErrorBatch;

/// Discriminant of [`FixAction`], shared with [`Suggestion::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    RestartPod,
    ScaleDeployment,
    UpdateConfig,
    ApplyManifest,
}

impl FixKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FixKind::RestartPod => "restart_pod",
            FixKind::ScaleDeployment => "scale_deployment",
            FixKind::UpdateConfig => "update_config",
            FixKind::ApplyManifest => "apply_manifest",
        }
    }
}

impl fmt::Display for FixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, executable remediation instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FixAction {
    RestartPod {
        namespace: String,
        pod_name: String,
        reason: String,
    },
    ScaleDeployment {
        namespace: String,
        deployment_name: String,
        replicas: i32,
        reason: String,
    },
    UpdateConfig {
        namespace: String,
        config_map_name: String,
        data: BTreeMap<String, String>,
        reason: String,
    },
    ApplyManifest {
        manifest: String,
        reason: String,
    },
}

impl FixAction {
    pub fn kind(&self) -> FixKind {
        match self {
            FixAction::RestartPod { .. } => FixKind::RestartPod,
            FixAction::ScaleDeployment { .. } => FixKind::ScaleDeployment,
            FixAction::UpdateConfig { .. } => FixKind::UpdateConfig,
            FixAction::ApplyManifest { .. } => FixKind::ApplyManifest,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            FixAction::RestartPod { reason, .. }
            | FixAction::ScaleDeployment { reason, .. }
            | FixAction::UpdateConfig { reason, .. }
            | FixAction::ApplyManifest { reason, .. } => reason,
        }
    }

    /// Short human label, e.g. `restart_pod prod/api-0`.
    pub fn label(&self) -> String {
        match self {
            FixAction::RestartPod {
                namespace,
                pod_name,
                ..
            } => format!("restart_pod {namespace}/{pod_name}"),
            FixAction::ScaleDeployment {
                namespace,
                deployment_name,
                replicas,
                ..
            } => format!("scale_deployment {namespace}/{deployment_name} -> {replicas}"),
            FixAction::UpdateConfig {
                namespace,
                config_map_name,
                ..
            } => format!("update_config {namespace}/{config_map_name}"),
            FixAction::ApplyManifest { .. } => "apply_manifest".to_string(),
        }
    }
}

/// Identity of a resource created by `apply_manifest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedResource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

/// A manifest document that was not applied because its kind is unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedResource {
    pub kind: String,
    pub name: Option<String>,
    pub reason: String,
}

/// Outcome reported by the cluster for any [`FixAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<AppliedResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedResource>,
}

impl FixResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            resources: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            resources: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// What caused a fix to be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FixOrigin {
    Batch(ErrorBatch),
    Suggestion(Suggestion),
    Manual,
}

/// Audit entry for an attempted fix. Present even when the fix failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedFix {
    pub timestamp: DateTime<Utc>,
    pub action: FixAction,
    pub result: FixResult,
    pub origin: FixOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_with_type_tag() {
        let action = FixAction::ScaleDeployment {
            namespace: "prod".into(),
            deployment_name: "api".into(),
            replicas: 3,
            reason: "load".into(),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], "scale_deployment");
        assert_eq!(value["deploymentName"], "api");
        assert_eq!(value["replicas"], 3);

        let back: FixAction = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind(), FixKind::ScaleDeployment);
    }

    #[test]
    fn test_unknown_type_is_rejected_at_parse_time() {
        let value = serde_json::json!({ "type": "drain_node", "reason": "x" });
        assert!(serde_json::from_value::<FixAction>(value).is_err());
    }

    #[test]
    fn test_label_and_reason() {
        let action = FixAction::RestartPod {
            namespace: "default".into(),
            pod_name: "web-1".into(),
            reason: "Detected connection issues".into(),
        };
        assert_eq!(action.label(), "restart_pod default/web-1");
        assert_eq!(action.reason(), "Detected connection issues");
    }
}
