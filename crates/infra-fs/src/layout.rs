// Queue directory layout

use filejob_core::domain::QueueList;
use filejob_core::error::{AppError, Result};
use std::path::{Path, PathBuf};

/// Name of the lock sentinel inside the queue directory
pub const LOCK_FILE_NAME: &str = ".lock";

/// Paths of the files making up one queue directory
#[derive(Debug, Clone)]
pub struct QueueLayout {
    basedir: PathBuf,
}

impl QueueLayout {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
        }
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn list_path(&self, list: QueueList) -> PathBuf {
        self.basedir.join(list.file_name())
    }

    pub fn lock_path(&self) -> PathBuf {
        self.basedir.join(LOCK_FILE_NAME)
    }

    /// Check the directory exists and create any missing list file (empty)
    ///
    /// Existing files are opened in append mode and never truncated, so this is
    /// safe to run while other workers hold the lock.
    pub async fn ensure(&self) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.basedir).await.map_err(|e| {
            AppError::Config(format!(
                "queue directory {} is not accessible: {}",
                self.basedir.display(),
                e
            ))
        })?;
        if !metadata.is_dir() {
            return Err(AppError::Config(format!(
                "queue path {} is not a directory",
                self.basedir.display()
            )));
        }

        for list in QueueList::ALL {
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.list_path(list))
                .await?;
        }
        Ok(())
    }
}
