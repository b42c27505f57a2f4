//! Keyword rules turning diagnostic-assistant text into [`Suggestion`]s.
//!
//! Each rule is evaluated independently, so one response can yield several
//! suggestions. Rules run on a lower-cased copy of the text; the YAML block
//! is extracted from the original text.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use kubemend_domain::{Confidence, FixAction, MonitoringTarget, Suggestion};

pub const DEFAULT_REPLICAS: i32 = 3;
const DEFAULT_NAMESPACE: &str = "default";
const UNKNOWN_POD: &str = "unknown";

static YAML_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```yaml\r?\n(.*?)```").expect("valid fence pattern"));

/// Config keys set when their keyword appears in the text.
const CONFIG_HINTS: [(&str, &str, &str); 3] = [
    ("memory", "MEMORY_LIMIT", "512Mi"),
    ("cpu", "CPU_LIMIT", "500m"),
    ("timeout", "TIMEOUT", "30"),
];

pub fn parse_suggestions(text: &str, target: Option<&MonitoringTarget>) -> Vec<Suggestion> {
    let lowered = text.to_lowercase();
    let namespace = target
        .map(|t| t.namespace.as_str())
        .unwrap_or(DEFAULT_NAMESPACE);
    let pod = target.map(|t| t.pod_name.as_str()).unwrap_or(UNKNOWN_POD);
    let mut suggestions = Vec::new();

    if lowered.contains("restart") || lowered.contains("delete pod") {
        suggestions.push(Suggestion::new(
            "Restart pod",
            format!("Delete {namespace}/{pod} so its controller recreates it"),
            FixAction::RestartPod {
                namespace: namespace.to_string(),
                pod_name: pod.to_string(),
                reason: "Diagnostic assistant recommended a restart".to_string(),
            },
            Confidence::High,
        ));
    }

    if lowered.contains("scale") || lowered.contains("replicas") {
        let deployment = format!("{pod}-deployment");
        suggestions.push(Suggestion::new(
            "Scale deployment",
            format!("Scale {namespace}/{deployment} to {DEFAULT_REPLICAS} replicas"),
            FixAction::ScaleDeployment {
                namespace: namespace.to_string(),
                deployment_name: deployment,
                replicas: DEFAULT_REPLICAS,
                reason: "Diagnostic assistant recommended scaling".to_string(),
            },
            Confidence::Medium,
        ));
    }

    if lowered.contains("config") || lowered.contains("environment") {
        let config_map = format!("{pod}-config");
        let data: BTreeMap<String, String> = CONFIG_HINTS
            .iter()
            .filter(|(keyword, _, _)| lowered.contains(keyword))
            .map(|(_, key, value)| (key.to_string(), value.to_string()))
            .collect();
        suggestions.push(Suggestion::new(
            "Update configuration",
            format!("Merge {} key(s) into ConfigMap {namespace}/{config_map}", data.len()),
            FixAction::UpdateConfig {
                namespace: namespace.to_string(),
                config_map_name: config_map,
                data,
                reason: "Diagnostic assistant recommended a configuration change".to_string(),
            },
            Confidence::Low,
        ));
    }

    if let Some(manifest) = extract_yaml_block(text) {
        suggestions.push(Suggestion::new(
            "Apply manifest",
            "Create the resources from the YAML provided by the assistant",
            FixAction::ApplyManifest {
                manifest: manifest.to_string(),
                reason: "Diagnostic assistant provided a manifest".to_string(),
            },
            Confidence::Medium,
        ));
    }

    suggestions
}

/// Content of the first ```` ```yaml ```` fence, exclusive of the delimiters.
pub fn extract_yaml_block(text: &str) -> Option<&str> {
    YAML_BLOCK
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubemend_domain::FixKind;

    fn target() -> MonitoringTarget {
        MonitoringTarget::new("shop", "cart-7f9c", Some("cart".into()))
    }

    #[test]
    fn test_yaml_block_becomes_one_manifest_suggestion() {
        let text = "Create a service:\n```yaml\nkind: Service\nmetadata:\n  name: cart\n```\nDone.";
        let suggestions = parse_suggestions(text, Some(&target()));
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, FixKind::ApplyManifest);
        assert_eq!(suggestions[0].confidence, Confidence::Medium);
        match &suggestions[0].action {
            FixAction::ApplyManifest { manifest, .. } => {
                assert_eq!(manifest, "kind: Service\nmetadata:\n  name: cart\n");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_restart_is_high_confidence() {
        let suggestions = parse_suggestions("You should Restart the pod.", Some(&target()));
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].confidence, Confidence::High);
        assert_eq!(
            suggestions[0].action,
            FixAction::RestartPod {
                namespace: "shop".into(),
                pod_name: "cart-7f9c".into(),
                reason: "Diagnostic assistant recommended a restart".into(),
            }
        );
    }

    #[test]
    fn test_scale_defaults_deployment_and_replicas() {
        let suggestions = parse_suggestions("increase replicas", Some(&target()));
        assert_eq!(suggestions.len(), 1);
        match &suggestions[0].action {
            FixAction::ScaleDeployment {
                deployment_name,
                replicas,
                ..
            } => {
                assert_eq!(deployment_name, "cart-7f9c-deployment");
                assert_eq!(*replicas, 3);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_config_data_from_keywords() {
        let text = "Raise the memory limit and the client timeout in the environment.";
        let suggestions = parse_suggestions(text, Some(&target()));
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].confidence, Confidence::Low);
        match &suggestions[0].action {
            FixAction::UpdateConfig {
                config_map_name,
                data,
                ..
            } => {
                assert_eq!(config_map_name, "cart-7f9c-config");
                assert_eq!(data.get("MEMORY_LIMIT").map(String::as_str), Some("512Mi"));
                assert_eq!(data.get("TIMEOUT").map(String::as_str), Some("30"));
                assert!(!data.contains_key("CPU_LIMIT"));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_rules_are_independent() {
        let text = "1. Restart the pod\n2. Scale to more replicas\n3. Fix the config\n```yaml\nkind: ConfigMap\n```";
        let kinds: Vec<_> = parse_suggestions(text, None)
            .into_iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                FixKind::RestartPod,
                FixKind::ScaleDeployment,
                FixKind::UpdateConfig,
                FixKind::ApplyManifest,
            ]
        );
    }

    #[test]
    fn test_missing_target_uses_placeholders() {
        let suggestions = parse_suggestions("delete pod and retry", None);
        assert_eq!(
            suggestions[0].action,
            FixAction::RestartPod {
                namespace: "default".into(),
                pod_name: "unknown".into(),
                reason: "Diagnostic assistant recommended a restart".into(),
            }
        );
    }

    #[test]
    fn test_empty_yaml_block_is_still_a_suggestion() {
        assert_eq!(extract_yaml_block("```yaml\n```"), Some(""));
        let suggestions = parse_suggestions("Nothing to add:\n```yaml\n```", None);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, FixKind::ApplyManifest);
    }

    #[test]
    fn test_plain_text_yields_nothing() {
        assert!(parse_suggestions("No meaningful response.", None).is_empty());
        assert!(extract_yaml_block("```json\n{}\n```").is_none());
    }
}
