//! Severity and pattern filter

use regex::Regex;

use crate::errors::LoopError;
use crate::models::error::NormalizedError;
use crate::models::levels::Severity;

/// Decides which errors a session keeps
#[derive(Debug, Clone)]
pub struct ErrorFilter {
    threshold: Severity,
    patterns: Vec<Regex>,
}

impl ErrorFilter {
    /// Compile the ignore patterns
    pub fn new(threshold: Severity, ignore_patterns: &[String]) -> Result<Self, LoopError> {
        let patterns = ignore_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            threshold,
            patterns,
        })
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    /// Whether `error` passes both the severity threshold and the ignore list
    pub fn allows(&self, error: &NormalizedError) -> bool {
        if !error.severity.meets(self.threshold) {
            return false;
        }
        !self.patterns.iter().any(|re| {
            re.is_match(&error.message) || error.stack.as_deref().is_some_and(|s| re.is_match(s))
        })
    }
}

impl Default for ErrorFilter {
    fn default() -> Self {
        Self {
            threshold: Severity::Low,
            patterns: Vec::new(),
        }
    }
}
