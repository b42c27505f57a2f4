use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::ErrorRecord;

/// Where a log window was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringTarget {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: Option<String>,
}

impl MonitoringTarget {
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: Option<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name,
        }
    }
}

impl fmt::Display for MonitoringTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod_name)?;
        if let Some(container) = &self.container_name {
            write!(f, "/{container}")?;
        }
        Ok(())
    }
}

/// The error records found in one container's log window during one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBatch {
    pub target: MonitoringTarget,
    pub errors: Vec<ErrorRecord>,
    pub raw_logs: String,
    pub observed_at: DateTime<Utc>,
}

impl ErrorBatch {
    /// Record contents joined by newlines, as handed to the diagnostic assistant.
    pub fn diagnostic_text(&self) -> String {
        self.errors
            .iter()
            .map(|record| record.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lower-cased concatenation of every record content.
    pub fn lowercase_contents(&self) -> String {
        self.errors
            .iter()
            .map(|record| record.content.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
