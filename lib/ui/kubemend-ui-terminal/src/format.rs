//! Plain-text and JSON rendering of command results.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use kubemend_application::{Diagnosis, LogReport, SessionStats};
use kubemend_domain::{
    AppliedFix, ClusterEvent, ErrorBatch, ErrorRecord, FixOrigin, NamespaceSummary, PodSummary,
};

use crate::cli::OutputFormat;

pub fn render<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text(value)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn stamp(at: Option<&DateTime<Utc>>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn namespaces(namespaces: &[NamespaceSummary]) -> String {
    let mut out = format!("{:<32} {:<12} {}\n", "NAME", "STATUS", "CREATED");
    for namespace in namespaces {
        let _ = writeln!(
            out,
            "{:<32} {:<12} {}",
            namespace.name,
            namespace.status.as_deref().unwrap_or("-"),
            stamp(namespace.created.as_ref())
        );
    }
    out
}

pub fn pods(pods: &[PodSummary]) -> String {
    if pods.is_empty() {
        return "No pods found.\n".to_string();
    }
    let mut out = format!(
        "{:<40} {:<10} {:>8}  {:<24} {}\n",
        "NAME", "PHASE", "RESTARTS", "CONTAINERS", "NODE"
    );
    for pod in pods {
        let _ = writeln!(
            out,
            "{:<40} {:<10} {:>8}  {:<24} {}",
            pod.name,
            pod.phase,
            pod.restart_count,
            pod.containers.join(","),
            pod.node.as_deref().unwrap_or("-")
        );
    }
    out
}

fn error_lines(out: &mut String, errors: &[ErrorRecord]) {
    for record in errors {
        let _ = writeln!(
            out,
            "  [{}] line {}: {}",
            record.severity, record.line, record.content
        );
    }
}

pub fn log_report(report: &LogReport) -> String {
    let mut out = format!("==> {} <==\n{}\n", report.logs.source, report.logs.logs.trim_end());
    if report.errors.is_empty() {
        out.push_str("\nNo errors detected.\n");
    } else {
        let _ = writeln!(out, "\nDetected {} error(s):", report.errors.len());
        error_lines(&mut out, &report.errors);
    }
    out
}

pub fn events(events: &[ClusterEvent]) -> String {
    if events.is_empty() {
        return "No warning events.\n".to_string();
    }
    let mut out = String::new();
    for event in events {
        let _ = write!(
            out,
            "{} {:<8} {:<20} {}: {}",
            stamp(event.timestamp.as_ref()),
            event.event_type,
            event.reason.as_deref().unwrap_or("-"),
            event.object,
            event.message.as_deref().unwrap_or("")
        );
        match event.count {
            Some(count) if count > 1 => {
                let _ = writeln!(out, " (x{count})");
            }
            _ => out.push('\n'),
        }
    }
    out
}

pub fn applied_fix(fix: &AppliedFix) -> String {
    let status = if fix.result.success { "OK" } else { "FAILED" };
    let mut out = format!("[{status}] {}: {}\n", fix.action.label(), fix.result.message);
    for resource in &fix.result.resources {
        let _ = writeln!(
            out,
            "  created {} {}/{}",
            resource.kind, resource.namespace, resource.name
        );
    }
    for skipped in &fix.result.skipped {
        let _ = writeln!(
            out,
            "  skipped {} {}: {}",
            skipped.kind,
            skipped.name.as_deref().unwrap_or("<unnamed>"),
            skipped.reason
        );
    }
    out
}

pub fn diagnosis(diagnosis: &Diagnosis) -> String {
    let mut out = format!("{}\n", diagnosis.response.trim_end());
    if !diagnosis.suggestions.is_empty() {
        out.push_str("\nSuggestions:\n");
        for (index, suggestion) in diagnosis.suggestions.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} [{}] {}",
                index + 1,
                suggestion.title,
                suggestion.confidence,
                suggestion.description
            );
        }
    }
    if !diagnosis.auto_applied.is_empty() {
        out.push_str("\nAuto-applied:\n");
        for fix in &diagnosis.auto_applied {
            out.push_str("  ");
            out.push_str(&applied_fix(fix));
        }
    }
    out
}

pub fn batch(batch: &ErrorBatch) -> String {
    let mut out = format!(
        "{} {} error(s) in {}\n",
        stamp(Some(&batch.observed_at)),
        batch.errors.len(),
        batch.target
    );
    error_lines(&mut out, &batch.errors);
    out
}

fn origin(origin: &FixOrigin) -> String {
    match origin {
        FixOrigin::Batch(batch) => format!("batch from {}", batch.target),
        FixOrigin::Suggestion(suggestion) => format!("suggestion \"{}\"", suggestion.title),
        FixOrigin::Manual => "manual".to_string(),
    }
}

pub fn ledger(fixes: &[AppliedFix]) -> String {
    if fixes.is_empty() {
        return "No fixes applied.\n".to_string();
    }
    let mut out = format!("Applied fixes ({}):\n", fixes.len());
    for fix in fixes {
        let _ = write!(
            out,
            "{} ({}) {}",
            stamp(Some(&fix.timestamp)),
            origin(&fix.origin),
            applied_fix(fix)
        );
    }
    out
}

pub fn session(stats: &SessionStats) -> String {
    format!(
        "Monitoring stopped after {} sweep(s): {} batch(es), {} log failure(s), {} namespace failure(s)\n",
        stats.sweeps, stats.batches, stats.log_failures, stats.namespace_failures
    )
}
