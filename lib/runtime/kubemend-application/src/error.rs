use kubemend_domain::FixKind;

/// Failures surfaced by the engine to whoever requested the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("cluster unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("failed to fetch logs for {target}: {message}")]
    LogFetchFailure { target: String, message: String },

    #[error("invalid manifest: {0}")]
    ManifestParseFailure(String),

    #[error("{message}")]
    FixFailed { kind: FixKind, message: String },

    #[error("diagnostic assistant unavailable: {0}")]
    AssistantUnavailable(String),
}

impl EngineError {
    pub(crate) fn unavailable(err: anyhow::Error) -> Self {
        EngineError::CollaboratorUnavailable(format!("{err:#}"))
    }

    pub(crate) fn fix_failed(kind: FixKind, err: anyhow::Error) -> Self {
        let verb = match kind {
            FixKind::RestartPod => "restart pod",
            FixKind::ScaleDeployment => "scale deployment",
            FixKind::UpdateConfig => "update ConfigMap",
            FixKind::ApplyManifest => "apply manifest",
        };
        EngineError::FixFailed {
            kind,
            message: format!("Failed to {verb}: {err:#}"),
        }
    }
}
