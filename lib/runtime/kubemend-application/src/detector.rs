//! Stateless classifier turning log text into [`ErrorRecord`]s.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};

use kubemend_domain::{ErrorRecord, LogLine, Severity};

/// Error signatures, tested in this order against every line.
pub const ERROR_SIGNATURES: [&str; 13] = [
    "error",
    "failed",
    "exception",
    "panic",
    "fatal",
    "timeout",
    "connection refused",
    "out of memory",
    "no space left",
    "permission denied",
    "crashloopbackoff",
    "imagepullbackoff",
    "evicted",
];

static SIGNATURES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(
        ERROR_SIGNATURES
            .iter()
            .map(|signature| format!("(?i){}", regex::escape(signature))),
    )
    .expect("error signatures are valid patterns")
});

static CRITICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)fatal|panic|crash").expect("valid severity pattern"));

// Connection refusals are classified with the hard failures, not as informational.
static ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?i)error|exception|failed|connection refused").expect("valid severity pattern")
});

static WARNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)warning|warn").expect("valid severity pattern"));

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("valid timestamp pattern")
});

/// Classify every line of `text`.
///
/// One record is produced per matching signature, so a line matching `k`
/// signatures yields `k` records with the same line number and content.
pub fn detect(text: &str) -> Vec<ErrorRecord> {
    let mut records = Vec::new();
    for line in LogLine::split(text) {
        let matches = SIGNATURES.matches(line.text);
        if !matches.matched_any() {
            continue;
        }
        let content = line.text.trim().to_string();
        let timestamp = extract_timestamp(line.text);
        for _ in matches.iter() {
            records.push(ErrorRecord {
                line: line.number,
                content: content.clone(),
                timestamp: timestamp.clone(),
                severity: severity_of(line.text),
            });
        }
    }
    records
}

/// Severity by strict priority, independent of which signature matched.
pub fn severity_of(line: &str) -> Severity {
    if CRITICAL.is_match(line) {
        Severity::Critical
    } else if ERROR.is_match(line) {
        Severity::Error
    } else if WARNING.is_match(line) {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// First `YYYY-MM-DDTHH:MM:SS` substring of the line.
pub fn extract_timestamp(line: &str) -> Option<String> {
    TIMESTAMP.find(line).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_refused_scenario() {
        let records = detect("2024-01-01T00:00:00 connection refused to db");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[0].severity, Severity::Error);
        assert_eq!(records[0].timestamp.as_deref(), Some("2024-01-01T00:00:00"));
        assert_eq!(records[0].content, "2024-01-01T00:00:00 connection refused to db");
    }

    #[test]
    fn test_one_record_per_matching_signature() {
        // "error", "failed" and "timeout" all match.
        let records = detect("ERROR: request failed after timeout");
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.line == 1));
        assert!(records.iter().all(|r| r.content == "ERROR: request failed after timeout"));
        assert!(records.iter().all(|r| r.severity == Severity::Error));
    }

    #[test]
    fn test_fatal_outranks_error() {
        let records = detect("fatal error: cannot allocate");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.severity == Severity::Critical));
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(severity_of("Pod crashed"), Severity::Critical);
        assert_eq!(severity_of("unhandled Exception"), Severity::Error);
        assert_eq!(severity_of("WARN: request timeout"), Severity::Warning);
        assert_eq!(severity_of("request timeout"), Severity::Info);
        assert_eq!(severity_of("pod was Evicted"), Severity::Info);
    }

    #[test]
    fn test_connection_refused_outranks_warning_marker() {
        assert_eq!(severity_of("warn: connection refused"), Severity::Error);
        let records = detect("WARNING upstream connection refused");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Error);
    }

    #[test]
    fn test_line_numbers_and_clean_lines() {
        let text = "starting up\nlistening on :8080\nBack-off restarting: CrashLoopBackOff\n";
        let records = detect(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].line, 3);
        assert_eq!(records[0].timestamp, None);
        assert_eq!(records[0].severity, Severity::Critical);
    }

    #[test]
    fn test_content_is_trimmed_and_kubelet_timestamps_are_cut() {
        let records = detect("  2025-03-04T05:06:07.123456789Z Permission denied  ");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "2025-03-04T05:06:07.123456789Z Permission denied");
        assert_eq!(records[0].timestamp.as_deref(), Some("2025-03-04T05:06:07"));
    }

    #[test]
    fn test_detect_is_deterministic() {
        let text = "panic: boom\nno space left on device\nok";
        assert_eq!(detect(text), detect(text));
        assert!(detect("").is_empty());
    }
}
