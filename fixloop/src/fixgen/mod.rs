//! Fix generation
//!
//! Errors are grouped by file and message head, each group is classified
//! and turned into one suggestion from a template, and the suggestions are
//! ranked.

pub mod classifier;
pub mod ranking;
pub mod templates;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::app::options::FixGenerationConfig;
use crate::errors::LoopError;
use crate::fixgen::classifier::classify;
use crate::fixgen::ranking::rank;
use crate::fixgen::templates::template_for;
use crate::models::error::NormalizedError;
use crate::models::fix::{FixStatus, FixSuggestion};
use crate::utils::generate_uuid;

/// Input of one generation call
#[derive(Debug, Clone)]
pub struct FixRequest {
    pub errors: Vec<NormalizedError>,
    pub max_fixes: usize,
    /// Suggestions wait for external confirmation before being applied
    pub require_approval: bool,
}

/// Ranked suggestions with a summary of how they were derived
#[derive(Debug, Clone, Default, Serialize)]
pub struct FixBatch {
    pub fixes: Vec<FixSuggestion>,
    pub reasoning: String,
}

/// Turns normalized errors into candidate remediations
#[async_trait]
pub trait FixGenerator: Send + Sync {
    async fn generate_fixes(&self, request: FixRequest) -> Result<FixBatch, LoopError>;
}

/// Build the configured generator
pub fn build_generator(config: &FixGenerationConfig) -> Result<RuleBasedGenerator, LoopError> {
    match (config.provider.as_str(), config.model.as_deref()) {
        ("rules", None) => Ok(RuleBasedGenerator::new()),
        ("rules", Some(model)) => Err(LoopError::ConfigError(format!(
            "Fix provider rules takes no model, got {}",
            model
        ))),
        (other, _) => Err(LoopError::ConfigError(format!(
            "Unsupported fix provider: {}",
            other
        ))),
    }
}

/// Grouping key: target file and the message up to its first colon
fn group_key(error: &NormalizedError) -> (&str, &str) {
    let head = error.message.split(':').next().unwrap_or("").trim();
    (error.source.file.as_str(), head)
}

/// Keyword classifier with fixed templates
#[derive(Debug, Default, Clone)]
pub struct RuleBasedGenerator;

impl RuleBasedGenerator {
    pub fn new() -> Self {
        Self
    }

    fn suggest(group: &[&NormalizedError]) -> Option<FixSuggestion> {
        // Most severe member represents the group, earliest wins ties
        let representative = group.iter().copied().reduce(|best, e| {
            if e.severity > best.severity {
                e
            } else {
                best
            }
        })?;
        let class = classify(representative);
        let template = template_for(class);
        let occurrences: u64 = group.iter().map(|e| e.occurrence_count).sum();

        Some(FixSuggestion {
            id: generate_uuid(),
            error_id: representative.id.clone(),
            kind: template.kind,
            priority: representative.severity.into(),
            confidence: template.confidence,
            impact: template.impact,
            category: class.as_str().to_string(),
            file: representative.source.file.clone(),
            explanation: template.explanation.to_string(),
            reasoning: format!(
                "{} distinct error(s), {} occurrence(s) in {} classified as {}: {}",
                group.len(),
                occurrences,
                representative.source.file,
                class,
                representative.message
            ),
            sketch: Some(template.sketch()),
            status: FixStatus::Pending,
        })
    }
}

#[async_trait]
impl FixGenerator for RuleBasedGenerator {
    async fn generate_fixes(&self, request: FixRequest) -> Result<FixBatch, LoopError> {
        let mut groups: Vec<((&str, &str), Vec<&NormalizedError>)> = Vec::new();
        for error in &request.errors {
            let key = group_key(error);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(error),
                None => groups.push((key, vec![error])),
            }
        }
        debug!("{} errors fall into {} groups", request.errors.len(), groups.len());

        let mut fixes = Vec::new();
        for (_, members) in &groups {
            if fixes.len() >= request.max_fixes {
                break;
            }
            if let Some(fix) = Self::suggest(members) {
                fixes.push(fix);
            }
        }
        rank(&mut fixes);

        let reasoning = format!(
            "Generated {} fix(es) for {} error(s) in {} group(s){}",
            fixes.len(),
            request.errors.len(),
            groups.len(),
            if request.require_approval {
                ", awaiting approval"
            } else {
                ""
            }
        );
        info!("{}", reasoning);

        Ok(FixBatch { fixes, reasoning })
    }
}
