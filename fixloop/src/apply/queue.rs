//! File-queue applicator
//!
//! Applied suggestions land in `<queue>/applied/`, those awaiting approval in
//! `<queue>/pending/`, one JSON file per suggestion. A downstream agent or
//! reviewer picks them up from there.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::apply::{ApplyOutcome, FixApplicator};
use crate::errors::LoopError;
use crate::filesys::dir::Dir;
use crate::models::fix::{FixStatus, FixSuggestion};

pub struct FileQueueApplicator {
    applied: Dir,
    pending: Dir,
    min_confidence: f64,
}

impl FileQueueApplicator {
    pub fn new(queue_dir: &Dir, min_confidence: f64) -> Self {
        Self {
            applied: queue_dir.subdir("applied"),
            pending: queue_dir.subdir("pending"),
            min_confidence,
        }
    }

    pub fn applied_dir(&self) -> &Dir {
        &self.applied
    }

    pub fn pending_dir(&self) -> &Dir {
        &self.pending
    }

    async fn write(dir: &Dir, fix: &FixSuggestion, status: FixStatus) -> Result<(), LoopError> {
        dir.create().await?;
        let mut record = fix.clone();
        record.status = status;
        let file = dir.file(&format!("{}.json", fix.id));
        file.write_json(&record).await?;
        debug!("Queued fix {} at {}", fix.id, file.path().display());
        Ok(())
    }
}

#[async_trait]
impl FixApplicator for FileQueueApplicator {
    async fn apply(&self, fix: &FixSuggestion) -> Result<ApplyOutcome, LoopError> {
        if fix.confidence < self.min_confidence {
            let reason = format!(
                "confidence {:.2} below minimum {:.2}",
                fix.confidence, self.min_confidence
            );
            info!("Rejecting fix {}: {}", fix.id, reason);
            return Ok(ApplyOutcome::Rejected(reason));
        }

        Self::write(&self.applied, fix, FixStatus::Applied)
            .await
            .map_err(|e| LoopError::ApplyError(format!("fix {}: {}", fix.id, e)))?;
        info!("Applied fix {} ({}) to {}", fix.id, fix.category, fix.file);
        Ok(ApplyOutcome::Applied)
    }

    async fn submit_for_approval(&self, fix: &FixSuggestion) -> Result<(), LoopError> {
        Self::write(&self.pending, fix, FixStatus::Pending).await?;
        info!("Fix {} awaiting approval", fix.id);
        Ok(())
    }
}
