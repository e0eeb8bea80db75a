// Queue Store Port (Interface)

use crate::domain::{Job, QueueList, QueueSnapshot};
use crate::error::Result;
use async_trait::async_trait;

/// Shared pending / in-progress / completed lists guarded by one lock.
///
/// Every method acquires the store lock for its whole duration and releases it on
/// every exit path. No intermediate state of a move is visible to another caller.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Take the first pending job and move it to in-progress (FIFO)
    ///
    /// Returns `None` and changes nothing when no job is pending.
    async fn claim_first_pending(&self) -> Result<Option<Job>>;

    /// Move the first exact match of `job` from `from` to the end of `to`
    ///
    /// # Errors
    /// - `DomainError::JobNotFound` if `job` is not in `from`; no list is modified
    async fn move_job(&self, job: &Job, from: QueueList, to: QueueList) -> Result<()>;

    /// Append jobs to the pending list
    async fn enqueue(&self, jobs: &[Job]) -> Result<usize>;

    /// Read all three lists
    async fn snapshot(&self) -> Result<QueueSnapshot>;

    /// Record that a claimed job has finished
    async fn complete(&self, job: &Job) -> Result<()> {
        self.move_job(job, QueueList::InProgress, QueueList::Completed)
            .await
    }

    /// Return a claimed job to the end of the pending list
    async fn requeue(&self, job: &Job) -> Result<()> {
        self.move_job(job, QueueList::InProgress, QueueList::Pending)
            .await
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::DomainError;
    use std::sync::Mutex;

    /// In-memory queue store; the mutex plays the role of the lock sentinel
    #[derive(Default)]
    pub struct InMemoryQueueStore {
        lists: Mutex<QueueSnapshot>,
    }

    impl InMemoryQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_pending<I, S>(commands: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let pending = commands
                .into_iter()
                .map(|c| Job::new(c).unwrap())
                .collect();
            Self {
                lists: Mutex::new(QueueSnapshot {
                    pending,
                    ..Default::default()
                }),
            }
        }

        /// Current contents without going through the async trait
        pub fn lists(&self) -> QueueSnapshot {
            self.lists.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn claim_first_pending(&self) -> Result<Option<Job>> {
            let mut lists = self.lists.lock().unwrap();
            if lists.pending.is_empty() {
                return Ok(None);
            }
            let job = lists.pending.remove(0);
            lists.in_progress.push(job.clone());
            Ok(Some(job))
        }

        async fn move_job(&self, job: &Job, from: QueueList, to: QueueList) -> Result<()> {
            let mut lists = self.lists.lock().unwrap();
            let source = lists.list_mut(from);
            let pos = source
                .iter()
                .position(|j| j == job)
                .ok_or_else(|| DomainError::JobNotFound {
                    job: job.to_string(),
                    list: from,
                })?;
            source.remove(pos);
            lists.list_mut(to).push(job.clone());
            Ok(())
        }

        async fn enqueue(&self, jobs: &[Job]) -> Result<usize> {
            self.lists
                .lock()
                .unwrap()
                .pending
                .extend(jobs.iter().cloned());
            Ok(jobs.len())
        }

        async fn snapshot(&self) -> Result<QueueSnapshot> {
            Ok(self.lists())
        }
    }

}
