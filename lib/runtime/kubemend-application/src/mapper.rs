//! First-match heuristics from an [`ErrorBatch`] to a remediation.

use tracing::info;

use kubemend_domain::{ErrorBatch, FixAction};

pub const CRASH_REASON: &str = "Detected CrashLoopBackOff or exit errors";
pub const CONNECTION_REASON: &str = "Detected connection issues";

/// At most one action per batch; the first matching rule wins.
pub fn map_batch(batch: &ErrorBatch) -> Option<FixAction> {
    let text = batch.lowercase_contents();
    let target = &batch.target;

    if text.contains("crashloopbackoff") || text.contains("exit code") {
        return Some(restart(batch, CRASH_REASON));
    }

    if text.contains("out of memory") || text.contains("oom") {
        // Scaling would need the owning deployment, which pod logs do not name.
        info!(
            namespace = %target.namespace,
            pod = %target.pod_name,
            "OOM detected; no automatic remediation without a deployment name"
        );
        return None;
    }

    if text.contains("connection refused") || text.contains("timeout") {
        return Some(restart(batch, CONNECTION_REASON));
    }

    None
}

fn restart(batch: &ErrorBatch, reason: &str) -> FixAction {
    FixAction::RestartPod {
        namespace: batch.target.namespace.clone(),
        pod_name: batch.target.pod_name.clone(),
        reason: reason.to_string(),
    }
}
