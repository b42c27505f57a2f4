//! Executes a [`FixAction`] against the cluster.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use kubemend_domain::{
    AppliedFix, AppliedResource, FixAction, FixKind, FixOrigin, FixResult, ResourceKind,
    SkippedResource,
};
use kubemend_ports::ClusterPort;

use crate::error::EngineError;

const DEFAULT_NAMESPACE: &str = "default";

/// One document of a multi-document manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub body: serde_json::Value,
}

#[derive(Clone)]
pub struct Dispatcher {
    cluster: Arc<dyn ClusterPort>,
}

impl Dispatcher {
    pub fn new(cluster: Arc<dyn ClusterPort>) -> Self {
        Self { cluster }
    }

    pub async fn apply(&self, action: &FixAction) -> Result<FixResult, EngineError> {
        info!(action = %action.label(), reason = action.reason(), "applying fix");
        let kind = action.kind();
        match action {
            FixAction::RestartPod {
                namespace,
                pod_name,
                ..
            } => {
                self.cluster
                    .delete_pod(namespace, pod_name)
                    .await
                    .map_err(|err| EngineError::fix_failed(kind, err))?;
                Ok(FixResult::succeeded(format!(
                    "Pod {pod_name} deleted and will be recreated"
                )))
            }
            FixAction::ScaleDeployment {
                namespace,
                deployment_name,
                replicas,
                ..
            } => {
                self.cluster
                    .patch_deployment_replicas(namespace, deployment_name, *replicas)
                    .await
                    .map_err(|err| EngineError::fix_failed(kind, err))?;
                Ok(FixResult::succeeded(format!(
                    "Deployment {deployment_name} scaled to {replicas} replicas"
                )))
            }
            FixAction::UpdateConfig {
                namespace,
                config_map_name,
                data,
                ..
            } => {
                self.cluster
                    .patch_config_map(namespace, config_map_name, data)
                    .await
                    .map_err(|err| EngineError::fix_failed(kind, err))?;
                Ok(FixResult::succeeded(format!(
                    "ConfigMap {config_map_name} updated"
                )))
            }
            FixAction::ApplyManifest { manifest, .. } => self.apply_manifest(manifest).await,
        }
    }

    /// Apply `action` and wrap the outcome in an audit entry, failures included.
    pub async fn execute(&self, action: FixAction, origin: FixOrigin) -> AppliedFix {
        let result = match self.apply(&action).await {
            Ok(result) => result,
            Err(err) => {
                warn!(action = %action.label(), error = %err, "fix failed");
                FixResult::failed(err.to_string())
            }
        };
        AppliedFix {
            timestamp: Utc::now(),
            action,
            result,
            origin,
        }
    }

    async fn apply_manifest(&self, manifest: &str) -> Result<FixResult, EngineError> {
        let documents = parse_manifest(manifest)?;
        let total = documents.len();
        let mut resources = Vec::new();
        let mut skipped = Vec::new();

        for document in documents {
            let Some(kind) = ResourceKind::parse(&document.kind) else {
                warn!(kind = %document.kind, name = %document.name, "unsupported resource kind; skipping");
                skipped.push(SkippedResource {
                    kind: document.kind,
                    name: Some(document.name),
                    reason: "unsupported resource kind".to_string(),
                });
                continue;
            };
            if let Err(err) = self
                .cluster
                .create_resource(kind, &document.namespace, &document.body)
                .await
            {
                // Earlier documents already exist in the cluster; report them.
                let failure = EngineError::fix_failed(FixKind::ApplyManifest, err);
                warn!(kind = %document.kind, name = %document.name, error = %failure, "manifest apply stopped");
                return Ok(FixResult {
                    success: false,
                    message: format!("{failure} after creating {} of {total}", resources.len()),
                    resources,
                    skipped,
                });
            }
            resources.push(AppliedResource {
                kind: document.kind,
                name: document.name,
                namespace: document.namespace,
            });
        }

        let mut message = format!("Applied {} resources", resources.len());
        if !skipped.is_empty() {
            message.push_str(&format!(", skipped {} unsupported", skipped.len()));
        }
        Ok(FixResult {
            success: true,
            message,
            resources,
            skipped,
        })
    }
}

/// Split a YAML stream into documents. Empty documents are ignored.
pub fn parse_manifest(manifest: &str) -> Result<Vec<ManifestDocument>, EngineError> {
    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(manifest).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|err| EngineError::ManifestParseFailure(err.to_string()))?;
        if value.is_null() {
            continue;
        }
        let body = serde_json::to_value(&value).map_err(|err| {
            EngineError::ManifestParseFailure(format!("document {}: {err}", index + 1))
        })?;
        let kind = body
            .get("kind")
            .and_then(|kind| kind.as_str())
            .ok_or_else(|| {
                EngineError::ManifestParseFailure(format!("document {} has no kind", index + 1))
            })?
            .to_string();
        let name = body
            .pointer("/metadata/name")
            .and_then(|name| name.as_str())
            .ok_or_else(|| {
                EngineError::ManifestParseFailure(format!(
                    "document {} has no metadata.name",
                    index + 1
                ))
            })?
            .to_string();
        let namespace = body
            .pointer("/metadata/namespace")
            .and_then(|ns| ns.as_str())
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string();
        documents.push(ManifestDocument {
            kind,
            name,
            namespace,
            body,
        });
    }

    if documents.is_empty() {
        return Err(EngineError::ManifestParseFailure(
            "manifest contains no documents".to_string(),
        ));
    }
    Ok(documents)
}
