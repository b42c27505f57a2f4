use std::future::Future;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use kubemend_application::{BatchHandler, Runtime};
use kubemend_domain::ErrorBatch;

use crate::cli::{Command, DiagnoseArgs, MonitorArgs, OutputFormat};
use crate::format::{self, render};

/// Run every subcommand except `monitor`, which needs a shutdown signal.
pub async fn execute(
    runtime: &Runtime,
    command: Command,
    output: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let text = match command {
        Command::Namespaces => {
            let namespaces = runtime.namespaces().await?;
            render(output, namespaces.as_slice(), format::namespaces)?
        }
        Command::Pods { namespace } => {
            let pods = runtime.pods(&namespace).await?;
            render(output, pods.as_slice(), format::pods)?
        }
        Command::Logs {
            pod,
            namespace,
            container,
        } => {
            let report = runtime
                .fetch_logs(&namespace, &pod, container.as_deref())
                .await?;
            render(output, &report, format::log_report)?
        }
        Command::Events { namespace } => {
            let events = runtime.warning_events(namespace.as_deref()).await?;
            render(output, events.as_slice(), format::events)?
        }
        Command::Restart { pod, namespace } => {
            let fix = runtime.restart_pod(&namespace, &pod).await;
            write!(out, "{}", render(output, &fix, format::applied_fix)?)?;
            if !fix.result.success {
                bail!("{}", fix.result.message);
            }
            return Ok(());
        }
        Command::Diagnose(args) => {
            let logs = read_input(args.file.as_deref())?;
            diagnose(runtime, &args, &logs, output).await?
        }
        Command::Monitor(_) => bail!("monitor requires a shutdown signal"),
    };
    write!(out, "{text}")?;
    Ok(())
}

pub async fn diagnose(
    runtime: &Runtime,
    args: &DiagnoseArgs,
    logs: &str,
    output: OutputFormat,
) -> Result<String> {
    if logs.trim().is_empty() {
        bail!("no log text to diagnose");
    }
    if args.apply_high {
        runtime.set_auto_apply(true);
    }
    let target = args.target();
    let diagnosis = runtime.diagnose(logs, target.as_ref()).await?;
    render(output, &diagnosis, format::diagnosis)
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading logs from stdin")?;
            Ok(buffer)
        }
    }
}

/// Prints each batch and optionally asks the assistant about it. Lines are
/// handed back to the foreground loop, which owns the output stream.
struct BatchReporter {
    runtime: Runtime,
    output: OutputFormat,
    diagnose: bool,
    lines: mpsc::UnboundedSender<String>,
}

impl BatchReporter {
    fn emit(&self, rendered: Result<String>) {
        let line = rendered.unwrap_or_else(|err| format!("render failed: {err:#}"));
        let _ = self.lines.send(line);
    }
}

#[async_trait]
impl BatchHandler for BatchReporter {
    async fn on_batch(&self, batch: ErrorBatch) {
        self.emit(render(self.output, &batch, format::batch));
        if !self.diagnose {
            return;
        }
        match self.runtime.diagnose_batch(&batch).await {
            Ok(diagnosis) => self.emit(render(self.output, &diagnosis, format::diagnosis)),
            Err(err) => self.emit(Ok(format!("Diagnosis of {} failed: {err}\n", batch.target))),
        }
    }
}

/// Monitor until `shutdown` resolves, then print the fix ledger.
pub async fn monitor(
    runtime: &Runtime,
    args: MonitorArgs,
    output: OutputFormat,
    shutdown: impl Future<Output = ()>,
    out: &mut dyn Write,
) -> Result<()> {
    if args.auto_fix {
        runtime.set_auto_fix(true);
    }
    if args.auto_apply {
        runtime.set_auto_apply(true);
    }

    let (lines, mut received) = mpsc::unbounded_channel();
    let reporter = Arc::new(BatchReporter {
        runtime: runtime.clone(),
        output,
        diagnose: args.diagnose,
        lines,
    });
    let namespaces = (!args.namespaces.is_empty()).then_some(args.namespaces);
    let Some(session) = runtime.start_monitoring(namespaces, Some(reporter)) else {
        bail!("monitoring is already running");
    };
    info!("monitoring started, press Ctrl-C to stop");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(line) = received.recv() => write!(out, "{line}")?,
        }
    }

    let stats = session.stop().await;
    while let Ok(line) = received.try_recv() {
        write!(out, "{line}")?;
    }
    write!(out, "{}", format::session(&stats))?;
    let fixes = runtime.applied_fixes();
    write!(out, "{}", render(output, fixes.as_slice(), format::ledger)?)?;
    Ok(())
}
