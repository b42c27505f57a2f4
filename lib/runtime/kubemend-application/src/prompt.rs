use chrono::{DateTime, Utc};

use kubemend_domain::MonitoringTarget;
use kubemend_ports::AssistantRequest;

pub const SYSTEM_PROMPT: &str = "You are an expert DevOps AI. Help fix deployment, build and \
runtime errors from Kubernetes logs. Be concise and give accurate, actionable solutions.";

/// Request asking the assistant for a structured diagnosis of `logs`.
pub fn diagnosis_request(
    logs: &str,
    target: Option<&MonitoringTarget>,
    at: DateTime<Utc>,
) -> AssistantRequest {
    let mut user_prompt = String::from("Analyze these Kubernetes logs.\n\n");
    if let Some(target) = target {
        user_prompt.push_str(&format!("Namespace: {}\n", target.namespace));
        user_prompt.push_str(&format!("Pod: {}\n", target.pod_name));
        if let Some(container) = &target.container_name {
            user_prompt.push_str(&format!("Container: {container}\n"));
        }
    }
    user_prompt.push_str(&format!("Timestamp: {}\n\n", at.to_rfc3339()));
    user_prompt.push_str("Logs:\n```\n");
    user_prompt.push_str(logs);
    if !logs.ends_with('\n') {
        user_prompt.push('\n');
    }
    user_prompt.push_str("```\n\n");
    user_prompt.push_str(
        "Respond with these sections:\n\
         1. Root cause analysis\n\
         2. Immediate fix\n\
         3. Exact kubectl commands to run\n\
         4. YAML manifests if needed, in ```yaml fenced blocks\n\
         5. Prevention\n",
    );

    AssistantRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt,
    }
}
