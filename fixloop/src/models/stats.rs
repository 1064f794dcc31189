//! Aggregated loop statistics

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::iteration::Iteration;

/// Number of distinct errors reported in `top_errors`
pub const DEFAULT_TOP_ERRORS: usize = 5;

/// How often one distinct error was seen during the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrequency {
    pub message: String,
    pub file: String,
    pub line: u32,
    /// Summed occurrence counts across iterations
    pub occurrences: u64,
    /// Number of iterations the error showed up in
    pub iterations: u32,
}

/// Statistics derived from the iteration history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugLoopStats {
    pub total_iterations: u32,
    pub total_fixes_applied: usize,
    pub errors_remaining: usize,
    pub average_iteration_secs: f64,
    pub errors_by_category: BTreeMap<String, usize>,
    pub errors_by_severity: BTreeMap<String, usize>,
    pub top_errors: Vec<ErrorFrequency>,
    /// Sources that failed during the latest monitoring session
    pub degraded_sources: Vec<String>,
}

impl DebugLoopStats {
    /// Compute statistics from history. Nothing here is cached.
    pub fn from_history(history: &[Iteration], degraded_sources: Vec<String>, top_n: usize) -> Self {
        let total_fixes_applied = history.iter().map(|it| it.applied.len()).sum();
        let errors_remaining = history.last().map(|it| it.errors.len()).unwrap_or(0);

        let durations: Vec<f64> = history
            .iter()
            .filter_map(|it| it.duration())
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .collect();
        let average_iteration_secs = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        let mut errors_by_category = BTreeMap::new();
        let mut errors_by_severity = BTreeMap::new();
        let mut frequencies: HashMap<String, ErrorFrequency> = HashMap::new();

        for iteration in history {
            for error in &iteration.errors {
                *errors_by_category.entry(error.category.clone()).or_insert(0) += 1;
                *errors_by_severity
                    .entry(error.severity.as_str().to_string())
                    .or_insert(0) += 1;

                let entry = frequencies
                    .entry(error.fingerprint())
                    .or_insert_with(|| ErrorFrequency {
                        message: error.message.clone(),
                        file: error.source.file.clone(),
                        line: error.source.line,
                        occurrences: 0,
                        iterations: 0,
                    });
                entry.occurrences += error.occurrence_count;
                entry.iterations += 1;
            }
        }

        let mut top_errors: Vec<ErrorFrequency> = frequencies.into_values().collect();
        top_errors.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.message.cmp(&b.message))
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.line.cmp(&b.line))
        });
        top_errors.truncate(top_n);

        Self {
            total_iterations: history.len() as u32,
            total_fixes_applied,
            errors_remaining,
            average_iteration_secs,
            errors_by_category,
            errors_by_severity,
            top_errors,
            degraded_sources,
        }
    }
}
