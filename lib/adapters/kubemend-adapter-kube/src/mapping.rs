use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Event, Namespace, Pod};
use serde::Serialize;

use kubemend_domain::{ClusterEvent, NamespaceSummary, PodPhase, PodSummary};

pub fn namespace_summary(namespace: &Namespace) -> NamespaceSummary {
    NamespaceSummary {
        name: namespace.metadata.name.clone().unwrap_or_default(),
        status: namespace
            .status
            .as_ref()
            .and_then(|status| status.phase.clone()),
        created: namespace
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(to_utc),
    }
}

pub fn pod_summary(pod: &Pod) -> PodSummary {
    let status = pod.status.as_ref();
    let phase = status
        .and_then(|status| status.phase.as_deref())
        .map(PodPhase::parse)
        .unwrap_or(PodPhase::Unknown);
    let restart_count = status
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(|s| s.restart_count).sum())
        .unwrap_or(0);

    PodSummary {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        phase,
        containers: pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default(),
        restart_count,
        created: pod.metadata.creation_timestamp.as_ref().and_then(to_utc),
        node: pod.spec.as_ref().and_then(|spec| spec.node_name.clone()),
    }
}

pub fn is_warning(event: &Event) -> bool {
    matches!(event.type_.as_deref(), Some("Warning" | "Error"))
}

/// `firstTimestamp` is preferred; newer events only carry `eventTime`.
pub fn cluster_event(event: &Event) -> ClusterEvent {
    let involved = &event.involved_object;
    ClusterEvent {
        namespace: event.metadata.namespace.clone(),
        reason: event.reason.clone(),
        message: event.message.clone(),
        event_type: event.type_.clone().unwrap_or_default(),
        object: format!(
            "{}/{}",
            involved.kind.as_deref().unwrap_or_default(),
            involved.name.as_deref().unwrap_or_default()
        ),
        timestamp: event
            .first_timestamp
            .as_ref()
            .and_then(to_utc)
            .or_else(|| event.event_time.as_ref().and_then(to_utc)),
        count: event.count,
    }
}

pub fn newest_first(mut events: Vec<ClusterEvent>) -> Vec<ClusterEvent> {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events
}

// Time and MicroTime both serialize as RFC 3339 strings.
fn to_utc<T: Serialize>(time: &T) -> Option<DateTime<Utc>> {
    let value = serde_json::to_value(time).ok()?;
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> Event {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_pod_summary_sums_restarts() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": {
                "name": "api-0",
                "namespace": "prod",
                "creationTimestamp": "2024-05-01T10:00:00Z"
            },
            "spec": {
                "nodeName": "node-a",
                "containers": [{ "name": "app" }, { "name": "sidecar" }]
            },
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    { "name": "app", "restartCount": 4, "ready": true, "image": "app", "imageID": "" },
                    { "name": "sidecar", "restartCount": 1, "ready": true, "image": "proxy", "imageID": "" }
                ]
            }
        }))
        .unwrap();

        let summary = pod_summary(&pod);

        assert_eq!(summary.name, "api-0");
        assert_eq!(summary.phase, PodPhase::Running);
        assert_eq!(summary.containers, vec!["app", "sidecar"]);
        assert_eq!(summary.restart_count, 5);
        assert_eq!(summary.node.as_deref(), Some("node-a"));
        assert!(summary.created.is_some());
    }

    #[test]
    fn test_pod_without_status_is_unknown() {
        let pod: Pod = serde_json::from_value(json!({ "metadata": { "name": "job-1" } })).unwrap();
        let summary = pod_summary(&pod);
        assert_eq!(summary.phase, PodPhase::Unknown);
        assert!(summary.containers.is_empty());
        assert_eq!(summary.restart_count, 0);
    }

    #[test]
    fn test_namespace_summary() {
        let namespace: Namespace = serde_json::from_value(json!({
            "metadata": { "name": "prod" },
            "status": { "phase": "Active" }
        }))
        .unwrap();
        let summary = namespace_summary(&namespace);
        assert_eq!(summary.name, "prod");
        assert_eq!(summary.status.as_deref(), Some("Active"));
        assert_eq!(summary.created, None);
    }

    #[test]
    fn test_event_falls_back_to_event_time() {
        let with_first = event(json!({
            "metadata": { "name": "e1", "namespace": "prod" },
            "involvedObject": { "kind": "Pod", "name": "api-0" },
            "type": "Warning",
            "reason": "BackOff",
            "firstTimestamp": "2024-05-01T10:00:00Z",
            "count": 3
        }));
        let with_event_time = event(json!({
            "metadata": { "name": "e2", "namespace": "prod" },
            "involvedObject": { "kind": "Deployment", "name": "api" },
            "type": "Warning",
            "eventTime": "2024-05-01T11:00:00.000000Z"
        }));

        let first = cluster_event(&with_first);
        let second = cluster_event(&with_event_time);

        assert_eq!(first.object, "Pod/api-0");
        assert_eq!(first.count, Some(3));
        assert_eq!(second.object, "Deployment/api");
        assert!(second.timestamp.is_some());

        let ordered = newest_first(vec![first, second]);
        assert_eq!(ordered[0].object, "Deployment/api");
    }

    #[test]
    fn test_only_warning_and_error_events_pass() {
        let normal = event(json!({
            "metadata": { "name": "e3" },
            "involvedObject": {},
            "type": "Normal"
        }));
        let error = event(json!({
            "metadata": { "name": "e4" },
            "involvedObject": {},
            "type": "Error"
        }));
        assert!(!is_warning(&normal));
        assert!(is_warning(&error));
    }
}
