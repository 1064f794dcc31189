//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::LoopError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout of a fix loop run
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Default settings file, looked up in the working directory
    pub fn settings_file() -> File {
        File::new("fixloop.json")
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Get the runs directory, one JSON report per finished run
    pub fn runs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("runs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), LoopError> {
        self.logs_dir().create().await?;
        self.runs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new(".fixloop")
    }
}
