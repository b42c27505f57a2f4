//! Engine facade shared by the monitoring task and operator actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use kubemend_domain::{
    AppliedFix, ClusterEvent, ErrorBatch, ErrorRecord, Event, EventBus, EventLevel, FixAction,
    FixOrigin, MonitoringConfig, MonitoringTarget, NamespaceSummary, PodLogs, PodSummary,
    Suggestion,
};
use kubemend_ports::PortSet;

use crate::detector::detect;
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::gate::AutoApplyGate;
use crate::ledger::FixLedger;
use crate::mapper::map_batch;
use crate::monitor::{BatchHandler, Monitor, MonitorSession, MonitorSettings};
use crate::prompt::diagnosis_request;
use crate::suggestions::parse_suggestions;

pub const EMPTY_RESPONSE: &str = "No meaningful response.";
const MANUAL_RESTART_REASON: &str = "Manual restart";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogReport {
    pub logs: PodLogs,
    pub errors: Vec<ErrorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub response: String,
    pub suggestions: Vec<Suggestion>,
    pub auto_applied: Vec<AppliedFix>,
}

#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

struct Shared {
    ports: PortSet,
    config: MonitoringConfig,
    dispatcher: Dispatcher,
    monitor: Monitor,
    ledger: FixLedger,
    detected: Mutex<Vec<ErrorRecord>>,
    events: Mutex<EventBus>,
    auto_fix: AtomicBool,
    auto_apply: AtomicBool,
}

impl Runtime {
    pub fn new(ports: PortSet, config: MonitoringConfig) -> Self {
        let mut events = EventBus::default();
        events.push(Event::new(EventLevel::Info, "Runtime initialized"));
        let shared = Shared {
            dispatcher: Dispatcher::new(Arc::clone(&ports.cluster)),
            monitor: Monitor::new(Arc::clone(&ports.cluster)),
            ledger: FixLedger::new(),
            detected: Mutex::new(Vec::new()),
            events: Mutex::new(events),
            auto_fix: AtomicBool::new(config.auto_fix),
            auto_apply: AtomicBool::new(config.auto_apply),
            ports,
            config,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn ports(&self) -> &PortSet {
        &self.shared.ports
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.shared.config
    }

    pub fn set_auto_fix(&self, enabled: bool) {
        self.shared.auto_fix.store(enabled, Ordering::Release);
    }

    pub fn auto_fix_enabled(&self) -> bool {
        self.shared.auto_fix.load(Ordering::Acquire)
    }

    pub fn set_auto_apply(&self, enabled: bool) {
        self.shared.auto_apply.store(enabled, Ordering::Release);
    }

    pub fn gate(&self) -> AutoApplyGate {
        AutoApplyGate::new(self.shared.auto_apply.load(Ordering::Acquire))
    }

    pub async fn namespaces(&self) -> Result<Vec<NamespaceSummary>, EngineError> {
        self.shared
            .ports
            .cluster
            .list_namespaces()
            .await
            .map_err(EngineError::unavailable)
    }

    pub async fn pods(&self, namespace: &str) -> Result<Vec<PodSummary>, EngineError> {
        self.shared
            .ports
            .cluster
            .list_pods(namespace)
            .await
            .map_err(EngineError::unavailable)
    }

    /// Read a larger log window on demand and classify it.
    pub async fn fetch_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
    ) -> Result<LogReport, EngineError> {
        let logs = self
            .shared
            .ports
            .cluster
            .pod_logs(namespace, pod, container, self.shared.config.manual_tail_lines)
            .await
            .map_err(|err| EngineError::LogFetchFailure {
                target: PodLogs::source_for(namespace, pod, container),
                message: format!("{err:#}"),
            })?;
        let errors = detect(&logs.logs);
        if !errors.is_empty() {
            self.record_detected(&errors);
            self.push_event(
                EventLevel::Warn,
                format!("{} error(s) in {}", errors.len(), logs.source),
            );
        }
        Ok(LogReport { logs, errors })
    }

    /// Newest Warning/Error events, capped at the configured limit.
    pub async fn warning_events(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ClusterEvent>, EngineError> {
        let mut events = self
            .shared
            .ports
            .cluster
            .list_warning_events(namespace)
            .await
            .map_err(EngineError::unavailable)?;
        events.truncate(self.shared.config.events_limit);
        Ok(events)
    }

    /// Dispatch `action` and append the outcome to the ledger.
    pub async fn apply_fix(&self, action: FixAction, origin: FixOrigin) -> AppliedFix {
        let fix = self.shared.dispatcher.execute(action, origin).await;
        let level = if fix.result.success {
            EventLevel::Info
        } else {
            EventLevel::Error
        };
        self.push_event(level, format!("{}: {}", fix.action.label(), fix.result.message));
        self.shared.ledger.record(fix.clone());
        fix
    }

    pub async fn restart_pod(&self, namespace: &str, pod: &str) -> AppliedFix {
        let action = FixAction::RestartPod {
            namespace: namespace.to_string(),
            pod_name: pod.to_string(),
            reason: MANUAL_RESTART_REASON.to_string(),
        };
        self.apply_fix(action, FixOrigin::Manual).await
    }

    /// Operator confirmation of a suggestion of any confidence.
    pub async fn apply_suggestion(&self, suggestion: &Suggestion) -> AppliedFix {
        self.apply_fix(
            suggestion.action.clone(),
            FixOrigin::Suggestion(suggestion.clone()),
        )
        .await
    }

    /// Ask the assistant about `logs`, parse its answer, and run the auto-apply gate.
    pub async fn diagnose(
        &self,
        logs: &str,
        target: Option<&MonitoringTarget>,
    ) -> Result<Diagnosis, EngineError> {
        let request = diagnosis_request(logs, target, Utc::now());
        let response = self
            .shared
            .ports
            .assistant
            .complete(request)
            .await
            .map_err(|err| EngineError::AssistantUnavailable(format!("{err:#}")))?;
        let response = if response.trim().is_empty() {
            EMPTY_RESPONSE.to_string()
        } else {
            response
        };

        let suggestions = parse_suggestions(&response, target);
        info!(suggestions = suggestions.len(), "diagnosis parsed");
        let auto_applied = self
            .gate()
            .run(&suggestions, &self.shared.dispatcher, &self.shared.ledger)
            .await;
        for fix in &auto_applied {
            self.push_event(
                EventLevel::Info,
                format!("Auto-applied {}: {}", fix.action.label(), fix.result.message),
            );
        }

        Ok(Diagnosis {
            response,
            suggestions,
            auto_applied,
        })
    }

    pub async fn diagnose_batch(&self, batch: &ErrorBatch) -> Result<Diagnosis, EngineError> {
        self.diagnose(&batch.diagnostic_text(), Some(&batch.target))
            .await
    }

    /// Start sweeping `namespaces` (or the configured ones). Returns `None`
    /// when a session is already running.
    pub fn start_monitoring(
        &self,
        namespaces: Option<Vec<String>>,
        observer: Option<Arc<dyn BatchHandler>>,
    ) -> Option<MonitorSession> {
        let mut settings = MonitorSettings::from(&self.shared.config);
        if let Some(namespaces) = namespaces {
            settings.namespaces = namespaces;
        }
        let namespaces = settings.namespaces.join(", ");
        let handler = Arc::new(RuntimeBatchHandler {
            runtime: self.clone(),
            observer,
        });
        let session = self.shared.monitor.start(settings, handler)?;
        self.push_event(
            EventLevel::Info,
            format!("Monitoring started for namespaces: {namespaces}"),
        );
        Some(session)
    }

    pub fn is_monitoring(&self) -> bool {
        self.shared.monitor.is_running()
    }

    pub fn detected_errors(&self) -> Vec<ErrorRecord> {
        self.shared
            .detected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn applied_fixes(&self) -> Vec<AppliedFix> {
        self.shared.ledger.entries()
    }

    pub fn events(&self) -> Vec<Event> {
        let guard = self
            .shared
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.events().cloned().collect()
    }

    async fn auto_fix(&self, batch: &ErrorBatch) -> Option<AppliedFix> {
        let action = map_batch(batch)?;
        info!(action = %action.label(), reason = action.reason(), "attempting auto-fix");
        Some(self.apply_fix(action, FixOrigin::Batch(batch.clone())).await)
    }

    fn record_detected(&self, errors: &[ErrorRecord]) {
        self.shared
            .detected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(errors);
    }

    fn push_event(&self, level: EventLevel, message: impl Into<String>) {
        self.shared
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Event::new(level, message));
    }
}

/// Records each batch, applies the mapped fix when auto-fix is on, then
/// forwards the batch to the caller's observer.
struct RuntimeBatchHandler {
    runtime: Runtime,
    observer: Option<Arc<dyn BatchHandler>>,
}

#[async_trait]
impl BatchHandler for RuntimeBatchHandler {
    async fn on_batch(&self, batch: ErrorBatch) {
        self.runtime.record_detected(&batch.errors);
        self.runtime.push_event(
            EventLevel::Warn,
            format!("{} error(s) detected in {}", batch.errors.len(), batch.target),
        );
        if self.runtime.auto_fix_enabled() {
            self.runtime.auto_fix(&batch).await;
        }
        if let Some(observer) = &self.observer {
            observer.on_batch(batch).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use kubemend_domain::{Confidence, PodPhase};
    use kubemend_ports::testing::{ClusterCall, FakeAssistant, FakeCluster, pod};

    fn runtime(cluster: Arc<FakeCluster>, assistant: Arc<FakeAssistant>) -> Runtime {
        Runtime::new(PortSet::new(cluster, assistant), MonitoringConfig::default())
    }

    fn is_delete(call: &ClusterCall) -> bool {
        matches!(call, ClusterCall::DeletePod { .. })
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_fix_restarts_crashing_pod() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_pod(pod("default", "api-0", PodPhase::Running, &["app"]))
                .with_logs("default", "api-0", Some("app"), "Back-off: CrashLoopBackOff"),
        );
        let runtime = runtime(cluster.clone(), Arc::new(FakeAssistant::unavailable()));
        runtime.set_auto_fix(true);

        let session = runtime.start_monitoring(None, None).unwrap();
        wait_for(|| !runtime.applied_fixes().is_empty()).await;
        session.stop().await;

        let fixes = runtime.applied_fixes();
        assert_eq!(fixes.len(), 1);
        assert!(fixes[0].result.success);
        assert_eq!(fixes[0].action.reason(), "Detected CrashLoopBackOff or exit errors");
        assert!(matches!(fixes[0].origin, FixOrigin::Batch(_)));
        assert_eq!(cluster.count_calls(is_delete), 1);
        assert_eq!(runtime.detected_errors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitoring_without_auto_fix_only_records() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_pod(pod("default", "api-0", PodPhase::Running, &["app"]))
                .with_logs("default", "api-0", Some("app"), "connection refused"),
        );
        let runtime = runtime(cluster.clone(), Arc::new(FakeAssistant::unavailable()));

        let session = runtime.start_monitoring(None, None).unwrap();
        assert!(runtime.start_monitoring(None, None).is_none());
        wait_for(|| !runtime.detected_errors().is_empty()).await;
        session.stop().await;

        assert!(runtime.applied_fixes().is_empty());
        assert_eq!(cluster.count_calls(is_delete), 0);
        assert!(!runtime.is_monitoring());
    }

    #[tokio::test]
    async fn test_diagnose_auto_applies_high_confidence_once() {
        let cluster = Arc::new(FakeCluster::new());
        let assistant = Arc::new(FakeAssistant::replying(
            "Root cause: stale connection pool. Restart the pod and add more replicas.",
        ));
        let runtime = runtime(cluster.clone(), assistant.clone());
        runtime.set_auto_apply(true);
        let target = MonitoringTarget::new("prod", "api-0", Some("app".into()));

        let diagnosis = runtime
            .diagnose("connection refused", Some(&target))
            .await
            .unwrap();

        assert_eq!(diagnosis.suggestions.len(), 2);
        assert_eq!(diagnosis.auto_applied.len(), 1);
        assert_eq!(diagnosis.auto_applied[0].action, diagnosis.suggestions[0].action);
        assert_eq!(diagnosis.suggestions[0].confidence, Confidence::High);
        assert_eq!(cluster.count_calls(is_delete), 1);
        assert_eq!(runtime.applied_fixes().len(), 1);
        assert!(assistant.requests()[0].user_prompt.contains("Pod: api-0"));
    }

    #[tokio::test]
    async fn test_diagnose_without_gate_only_suggests() {
        let cluster = Arc::new(FakeCluster::new());
        let runtime = runtime(
            cluster.clone(),
            Arc::new(FakeAssistant::replying("Restart the pod.")),
        );

        let diagnosis = runtime.diagnose("error", None).await.unwrap();

        assert_eq!(diagnosis.suggestions.len(), 1);
        assert!(diagnosis.auto_applied.is_empty());
        assert!(cluster.calls().is_empty());

        let fix = runtime.apply_suggestion(&diagnosis.suggestions[0]).await;
        assert!(fix.result.success);
        assert_eq!(runtime.applied_fixes().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_response_is_replaced() {
        let runtime = runtime(
            Arc::new(FakeCluster::new()),
            Arc::new(FakeAssistant::replying("   ")),
        );
        let diagnosis = runtime.diagnose("error", None).await.unwrap();
        assert_eq!(diagnosis.response, EMPTY_RESPONSE);
        assert!(diagnosis.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_assistant_is_an_error() {
        let runtime = runtime(
            Arc::new(FakeCluster::new()),
            Arc::new(FakeAssistant::unavailable()),
        );
        let err = runtime.diagnose("error", None).await.unwrap_err();
        assert!(matches!(err, EngineError::AssistantUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_logs_uses_manual_window() {
        let cluster = Arc::new(FakeCluster::new().with_logs(
            "default",
            "api-0",
            None,
            "ok\n2024-05-01T10:00:00Z Exception in thread main",
        ));
        let runtime = runtime(cluster.clone(), Arc::new(FakeAssistant::unavailable()));

        let report = runtime.fetch_logs("default", "api-0", None).await.unwrap();

        assert_eq!(report.logs.source, "default/api-0");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 2);
        assert_eq!(runtime.detected_errors().len(), 1);
        assert!(matches!(
            &cluster.calls()[0],
            ClusterCall::PodLogs { tail_lines: 200, .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_logs_failure_is_surfaced() {
        let cluster = Arc::new(FakeCluster::new().with_failing_logs("default", "api-0", Some("app")));
        let runtime = runtime(cluster, Arc::new(FakeAssistant::unavailable()));
        let err = runtime
            .fetch_logs("default", "api-0", Some("app"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::LogFetchFailure { ref target, .. } if target == "default/api-0/app"));
    }

    #[tokio::test]
    async fn test_failed_manual_restart_is_still_recorded() {
        let cluster = Arc::new(FakeCluster::new().with_failing_mutations());
        let runtime = runtime(cluster, Arc::new(FakeAssistant::unavailable()));

        let fix = runtime.restart_pod("default", "api-0").await;

        assert!(!fix.result.success);
        assert_eq!(fix.origin, FixOrigin::Manual);
        assert_eq!(runtime.applied_fixes(), vec![fix]);
        assert!(runtime
            .events()
            .iter()
            .any(|event| event.level == EventLevel::Error));
    }

    #[tokio::test]
    async fn test_warning_events_are_capped() {
        let mut cluster = FakeCluster::new();
        for i in 0..60 {
            cluster = cluster.with_event(ClusterEvent {
                namespace: Some("default".into()),
                reason: Some("BackOff".into()),
                message: Some(format!("event {i}")),
                event_type: "Warning".into(),
                object: format!("Pod/api-{i}"),
                timestamp: Some(Utc::now() + chrono::Duration::seconds(i)),
                count: Some(1),
            });
        }
        let runtime = runtime(Arc::new(cluster), Arc::new(FakeAssistant::unavailable()));

        let events = runtime.warning_events(None).await.unwrap();

        assert_eq!(events.len(), 50);
        assert_eq!(events[0].message.as_deref(), Some("event 59"));
    }
}
