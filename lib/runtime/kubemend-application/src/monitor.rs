//! Background sweep over namespaces, pods and containers.
//!
//! A [`Monitor`] owns at most one running session. The session is a single
//! task: sweeps never overlap, and stopping is cooperative. The stop signal
//! is observed before each container fetch and during the pause between
//! sweeps, so an in-flight fetch always completes.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use kubemend_domain::{ErrorBatch, MonitoringConfig, MonitoringTarget};
use kubemend_ports::ClusterPort;

use crate::detector::detect;

/// Receives each batch before the sweep moves on to the next container.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn on_batch(&self, batch: ErrorBatch);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub namespaces: Vec<String>,
    pub interval: Duration,
    pub tail_lines: i64,
}

impl MonitorSettings {
    pub fn new(namespaces: Vec<String>) -> Self {
        let defaults = MonitoringConfig::default();
        Self {
            namespaces,
            interval: defaults.sweep_interval(),
            tail_lines: defaults.tail_lines,
        }
    }
}

impl From<&MonitoringConfig> for MonitorSettings {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            namespaces: config.namespaces.clone(),
            interval: config.sweep_interval(),
            tail_lines: config.tail_lines,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub sweeps: u64,
    pub batches: u64,
    pub log_failures: u64,
    pub namespace_failures: u64,
}

#[derive(Clone)]
pub struct Monitor {
    cluster: Arc<dyn ClusterPort>,
    running: Arc<AtomicBool>,
}

impl Monitor {
    pub fn new(cluster: Arc<dyn ClusterPort>) -> Self {
        Self {
            cluster,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn a session, or return `None` when one is already running.
    pub fn start(
        &self,
        settings: MonitorSettings,
        handler: Arc<dyn BatchHandler>,
    ) -> Option<MonitorSession> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("log monitoring already running; start ignored");
            return None;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let sweeper = Sweeper {
            cluster: Arc::clone(&self.cluster),
            settings,
            handler,
        };
        let guard = RunningGuard(Arc::clone(&self.running));
        let task = tokio::spawn(async move {
            let _guard = guard;
            sweeper.run(stop_rx).await
        });

        Some(MonitorSession { stop_tx, task })
    }
}

/// Clears the running flag however the session task ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to a running session. Dropping it also ends the session.
pub struct MonitorSession {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<SessionStats>,
}

impl MonitorSession {
    /// Request a stop and wait for the session to wind down. No collaborator
    /// call is issued once this returns.
    pub async fn stop(self) -> SessionStats {
        self.stop_tx.send_replace(true);
        match self.task.await {
            Ok(stats) => {
                info!(
                    sweeps = stats.sweeps,
                    batches = stats.batches,
                    "log monitoring stopped"
                );
                stats
            }
            Err(err) => {
                error!(error = %err, "monitoring task ended abnormally");
                SessionStats::default()
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct Sweeper {
    cluster: Arc<dyn ClusterPort>,
    settings: MonitorSettings,
    handler: Arc<dyn BatchHandler>,
}

fn stop_requested(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow() || stop.has_changed().is_err()
}

impl Sweeper {
    async fn run(&self, mut stop: watch::Receiver<bool>) -> SessionStats {
        info!(namespaces = ?self.settings.namespaces, "starting log monitoring");
        let mut stats = SessionStats::default();

        while !stop_requested(&stop) {
            if self.sweep(&stop, &mut stats).await.is_break() {
                break;
            }
            stats.sweeps += 1;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = stop.changed() => {}
            }
        }
        stats
    }

    async fn sweep(
        &self,
        stop: &watch::Receiver<bool>,
        stats: &mut SessionStats,
    ) -> ControlFlow<()> {
        for namespace in &self.settings.namespaces {
            if stop_requested(stop) {
                return ControlFlow::Break(());
            }
            let pods = match self.cluster.list_pods(namespace).await {
                Ok(pods) => pods,
                Err(err) => {
                    warn!(%namespace, error = %format!("{err:#}"), "failed to list pods; skipping namespace this sweep");
                    stats.namespace_failures += 1;
                    continue;
                }
            };

            for pod in pods.iter().filter(|pod| pod.phase.is_monitored()) {
                for container in &pod.containers {
                    if stop_requested(stop) {
                        return ControlFlow::Break(());
                    }

                    let logs = match self
                        .cluster
                        .pod_logs(namespace, &pod.name, Some(container), self.settings.tail_lines)
                        .await
                    {
                        Ok(logs) => logs,
                        Err(err) => {
                            warn!(%namespace, pod = %pod.name, %container, error = %format!("{err:#}"), "failed to get logs");
                            stats.log_failures += 1;
                            continue;
                        }
                    };

                    let errors = detect(&logs.logs);
                    if errors.is_empty() {
                        continue;
                    }
                    info!(%namespace, pod = %pod.name, %container, errors = errors.len(), "errors detected");
                    let batch = ErrorBatch {
                        target: MonitoringTarget::new(
                            namespace.clone(),
                            pod.name.clone(),
                            Some(container.clone()),
                        ),
                        errors,
                        raw_logs: logs.logs,
                        observed_at: Utc::now(),
                    };
                    stats.batches += 1;
                    self.handler.on_batch(batch).await;
                }
            }
        }
        ControlFlow::Continue(())
    }
}
