//! Raw source events and their normalization

use source_models::models::{CiRun, LogEntry, PushReport, ReplayError, StreamErrorFrame, TrackerIssue};

use crate::models::error::{NormalizedError, SourceLocation};
use crate::models::levels::Severity;
use crate::monitor::sources::SourceKind;

/// Event as delivered by a source, before normalization
#[derive(Debug, Clone)]
pub enum RawEvent {
    Stream(StreamErrorFrame),
    Tracker(TrackerIssue),
    Replay(ReplayError),
    Push(PushReport),
    Ci(CiRun),
    ServerLog(LogEntry),
}

/// `fatal / error / warning / info` vocabulary of trackers and streams
pub fn tracker_severity(level: Option<&str>) -> Severity {
    match level.map(str::to_lowercase).as_deref() {
        Some("fatal") => Severity::Critical,
        Some("error") => Severity::High,
        Some("warning") | Some("warn") => Severity::Medium,
        Some("info") => Severity::Low,
        _ => Severity::Medium,
    }
}

/// `fatal / error / warn / info` vocabulary of replay and log backends
pub fn log_severity(level: Option<&str>) -> Severity {
    match level.map(str::to_lowercase).as_deref() {
        Some("fatal") | Some("critical") => Severity::Critical,
        Some("error") => Severity::High,
        Some("warn") => Severity::Medium,
        Some("info") => Severity::Low,
        _ => Severity::Medium,
    }
}

/// Push reports use the loop's own vocabulary
pub fn push_severity(level: Option<&str>) -> Severity {
    level
        .and_then(|s| s.parse().ok())
        .unwrap_or(Severity::Medium)
}

fn location(file: Option<String>, line: Option<u32>, column: Option<u32>) -> SourceLocation {
    match file {
        Some(file) if !file.is_empty() => SourceLocation::new(file, line.unwrap_or(0)).with_column(column),
        _ => SourceLocation::unknown(),
    }
}

impl RawEvent {
    pub fn kind(&self) -> SourceKind {
        match self {
            RawEvent::Stream(_) => SourceKind::Stream,
            RawEvent::Tracker(_) => SourceKind::Tracker,
            RawEvent::Replay(_) => SourceKind::Replay,
            RawEvent::Push(_) => SourceKind::Push,
            RawEvent::Ci(_) => SourceKind::Ci,
            RawEvent::ServerLog(_) => SourceKind::ServerLog,
        }
    }

    /// Convert into the canonical shape. `None` when the event reports no error.
    pub fn normalize(self) -> Option<NormalizedError> {
        let error = match self {
            RawEvent::Stream(frame) => {
                if frame.frame_type != "error" {
                    return None;
                }
                let error = NormalizedError::new(
                    frame.message,
                    tracker_severity(frame.level.as_deref()),
                    "runtime",
                    location(frame.filename, frame.lineno, frame.colno),
                )
                .with_stack(frame.stack);
                match frame.timestamp {
                    Some(at) => error.seen_at(at),
                    None => error,
                }
            }
            RawEvent::Tracker(issue) => {
                let file = issue.metadata.filename.or(issue.culprit);
                let mut error = NormalizedError::new(
                    issue.title,
                    tracker_severity(issue.level.as_deref()),
                    "runtime",
                    location(file, issue.metadata.lineno, issue.metadata.colno),
                )
                .with_stack(issue.stacktrace);
                error.occurrence_count = issue.count.max(1);
                if let Some(first) = issue.first_seen {
                    error.first_seen_at = first;
                    error.timestamp = first;
                }
                if let Some(last) = issue.last_seen {
                    error.last_seen_at = last;
                }
                error
            }
            RawEvent::Replay(replay) => {
                let error = NormalizedError::new(
                    replay.message,
                    log_severity(replay.severity.as_deref()),
                    "runtime",
                    location(replay.url, replay.line, replay.column),
                )
                .with_stack(replay.stack);
                match replay.occurred_at {
                    Some(at) => error.seen_at(at),
                    None => error,
                }
            }
            RawEvent::Push(report) => {
                let category = report.category.unwrap_or_else(|| "runtime".to_string());
                let error = NormalizedError::new(
                    report.message,
                    push_severity(report.severity.as_deref()),
                    category,
                    location(report.file, report.line, report.column),
                )
                .with_stack(report.stack);
                match report.timestamp {
                    Some(at) => error.seen_at(at),
                    None => error,
                }
            }
            RawEvent::Ci(run) => {
                if run.status != "completed" {
                    return None;
                }
                let conclusion = run.conclusion.as_deref()?;
                if !matches!(conclusion, "failure" | "timed_out") {
                    return None;
                }
                let mut message = format!("CI pipeline {} concluded with {}", run.name, conclusion);
                if let Some(sha) = &run.head_sha {
                    message.push_str(&format!(" at {}", sha));
                }
                NormalizedError::new(
                    message,
                    Severity::High,
                    "deployment",
                    SourceLocation::new(run.html_url.unwrap_or(run.id), 0),
                )
            }
            RawEvent::ServerLog(entry) => NormalizedError::new(
                entry.message,
                log_severity(Some(entry.level.as_str())),
                "server",
                location(entry.file, entry.line, None),
            )
            .with_stack(entry.stack)
            .seen_at(entry.timestamp),
        };
        Some(error)
    }
}
