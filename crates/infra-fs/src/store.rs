// Shared-directory QueueStore Implementation

use async_trait::async_trait;
use filejob_core::application::worker::constants::MAX_JOB_LINE_BYTES;
use filejob_core::application::ShutdownToken;
use filejob_core::domain::{DomainError, Job, QueueList, QueueSnapshot};
use filejob_core::error::Result;
use filejob_core::port::{QueueStore, Sleeper, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info};

use crate::layout::QueueLayout;
use crate::lines;
use crate::lock::{LockGuard, LockOptions, SentinelLock};

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub lock: LockOptions,
    /// Longest job line accepted when claiming
    pub max_line_bytes: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock: LockOptions::default(),
            max_line_bytes: MAX_JOB_LINE_BYTES,
        }
    }
}

/// Queue store over `todo.txt`, `doing.txt` and `done.txt` in one directory
///
/// Each instance behaves like an independent process: it shares nothing in memory
/// with other instances and coordinates only through the `.lock` sentinel.
pub struct FileQueueStore {
    layout: QueueLayout,
    lock: SentinelLock,
    max_line_bytes: usize,
}

impl FileQueueStore {
    /// Open a queue directory, creating missing list files
    ///
    /// # Errors
    /// - `AppError::Config` if `basedir` is missing or not a directory
    pub async fn open(
        layout: QueueLayout,
        options: StoreOptions,
        time_provider: Arc<dyn TimeProvider>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        layout.ensure().await?;
        let lock = SentinelLock::new(layout.lock_path(), options.lock, time_provider, sleeper);

        debug!(basedir = %layout.basedir().display(), "Opened queue store");
        Ok(Self {
            layout,
            lock,
            max_line_bytes: options.max_line_bytes,
        })
    }

    /// Let a shutdown request interrupt lock waits already in progress
    pub fn with_shutdown(mut self, shutdown: ShutdownToken) -> Self {
        self.lock = self.lock.with_shutdown(shutdown);
        self
    }

    pub fn layout(&self) -> &QueueLayout {
        &self.layout
    }

    pub fn lock(&self) -> &SentinelLock {
        &self.lock
    }

    /// Move one line between lists. The guard proves the caller holds the lock.
    ///
    /// Nothing is written unless the line is found in `from`.
    async fn move_locked(
        &self,
        _guard: &LockGuard,
        job: &Job,
        from: QueueList,
        to: QueueList,
    ) -> Result<()> {
        let from_path = self.layout.list_path(from);
        let mut source = lines::read_jobs(&from_path).await?;

        let pos = source
            .iter()
            .position(|j| j == job)
            .ok_or_else(|| DomainError::JobNotFound {
                job: job.to_string(),
                list: from,
            })?;
        source.remove(pos);

        lines::rewrite_jobs(&from_path, &source).await?;
        lines::append_jobs(&self.layout.list_path(to), std::slice::from_ref(job)).await?;

        debug!(job = %job, from = %from, to = %to, "Moved job");
        Ok(())
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn claim_first_pending(&self) -> Result<Option<Job>> {
        let guard = self.lock.acquire().await?;

        let first = lines::read_first_job(
            &self.layout.list_path(QueueList::Pending),
            QueueList::Pending,
            self.max_line_bytes,
        )
        .await?;

        if let Some(job) = &first {
            self.move_locked(&guard, job, QueueList::Pending, QueueList::InProgress)
                .await?;
            info!(job = %job, "Claimed job");
        }
        Ok(first)
    }

    async fn move_job(&self, job: &Job, from: QueueList, to: QueueList) -> Result<()> {
        let guard = self.lock.acquire().await?;
        self.move_locked(&guard, job, from, to).await
    }

    async fn enqueue(&self, jobs: &[Job]) -> Result<usize> {
        if jobs.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.acquire().await?;
        lines::append_jobs(&self.layout.list_path(QueueList::Pending), jobs).await?;

        info!(count = jobs.len(), "Enqueued jobs");
        Ok(jobs.len())
    }

    async fn snapshot(&self) -> Result<QueueSnapshot> {
        let _guard = self.lock.acquire().await?;
        Ok(QueueSnapshot {
            pending: lines::read_jobs(&self.layout.list_path(QueueList::Pending)).await?,
            in_progress: lines::read_jobs(&self.layout.list_path(QueueList::InProgress)).await?,
            completed: lines::read_jobs(&self.layout.list_path(QueueList::Completed)).await?,
        })
    }
}
