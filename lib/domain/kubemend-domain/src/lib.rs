//! Domain models and invariants.

pub mod cluster;
pub mod config;
pub mod detection;
pub mod events;
pub mod fix;
pub mod suggestion;
pub mod target;

pub use cluster::{ClusterEvent, NamespaceSummary, PodLogs, PodPhase, PodSummary, ResourceKind};
pub use config::{AssistantConfig, ClusterConfig, KubemendConfig, MonitoringConfig};
pub use detection::{ErrorRecord, LogLine, Severity};
pub use events::{Event, EventBus, EventLevel};
pub use fix::{AppliedFix, AppliedResource, FixAction, FixKind, FixOrigin, FixResult, SkippedResource};
pub use suggestion::{Confidence, Suggestion};
pub use target::{ErrorBatch, MonitoringTarget};
