//! Normalized runtime errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::levels::Severity;
use crate::utils::{fingerprint, generate_uuid};

/// Where an error was raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column: None,
        }
    }

    /// Location used when a source reports no file information
    pub fn unknown() -> Self {
        Self::new("unknown", 0)
    }

    pub fn with_column(mut self, column: Option<u32>) -> Self {
        self.column = column;
        self
    }
}

/// Deduplication key of a normalized error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorIdentity<'a> {
    pub message: &'a str,
    pub file: &'a str,
    pub line: u32,
}

/// Canonical shape every source event is converted into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedError {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    /// Freeform category such as `runtime` or `deployment`
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub source: SourceLocation,
    pub occurrence_count: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
}

impl NormalizedError {
    /// Create a fresh error seen once, now
    pub fn new(
        message: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
        source: SourceLocation,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_uuid(),
            timestamp: now,
            severity,
            category: category.into(),
            message: message.into(),
            stack: None,
            source,
            occurrence_count: 1,
            first_seen_at: now,
            last_seen_at: now,
            resolved: false,
        }
    }

    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }

    /// Backdate the event to when the source saw it
    pub fn seen_at(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = at;
        self.first_seen_at = at;
        self.last_seen_at = at;
        self
    }

    pub fn identity(&self) -> ErrorIdentity<'_> {
        ErrorIdentity {
            message: &self.message,
            file: &self.source.file,
            line: self.source.line,
        }
    }

    /// Hex fingerprint of the identity, stable across sessions
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.message, &self.source.file, self.source.line)
    }
}
