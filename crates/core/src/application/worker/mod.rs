// Worker - Job execution loop

pub mod config;
pub mod constants;
mod shutdown;

pub use config::{ShutdownPolicy, WorkerConfig};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::domain::Job;
use crate::error::{AppError, Result};
use crate::port::{QueueStore, RunningTask, Sleeper, TaskExecutor};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Why a worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// `max_jobs` jobs were finished
    JobLimitReached,
    /// Too many consecutive polls found nothing to do
    AttemptsExhausted { attempts: u32 },
    /// SIGINT / SIGTERM or an explicit shutdown signal
    ShutdownRequested,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::JobLimitReached => write!(f, "finished the pre-set number of jobs"),
            HaltReason::AttemptsExhausted { attempts } => {
                write!(f, "no job found after {} attempts", attempts)
            }
            HaltReason::ShutdownRequested => write!(f, "shutdown requested"),
        }
    }
}

/// Run-loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Polling,
    Running,
    Completing,
    Halted(HaltReason),
}

/// What the run loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Tick again right away
    Continue,
    /// Sleep, then tick again
    Sleep(Duration),
    /// Stop for good
    Halt(HaltReason),
}

/// The claimed job and the child running it. Both are set or neither is.
struct ActiveJob {
    job: Job,
    task: Box<dyn RunningTask>,
}

/// Worker client: claims one job at a time from a queue store and runs it
pub struct Worker {
    store: Arc<dyn QueueStore>,
    executor: Arc<dyn TaskExecutor>,
    sleeper: Arc<dyn Sleeper>,
    config: WorkerConfig,
    state: WorkerState,
    current: Option<ActiveJob>,
    attempts: u32,
    finished_count: u64,
}

impl Worker {
    pub fn new(
        store: Arc<dyn QueueStore>,
        executor: Arc<dyn TaskExecutor>,
        sleeper: Arc<dyn Sleeper>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            sleeper,
            config,
            state: WorkerState::Idle,
            current: None,
            attempts: 0,
            finished_count: 0,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Consecutive polls that found no job
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Jobs this worker moved to the completed list
    pub fn finished_count(&self) -> u64 {
        self.finished_count
    }

    pub fn current_job(&self) -> Option<&Job> {
        self.current.as_ref().map(|active| &active.job)
    }

    /// Run until a halt condition is reached or shutdown is signalled
    ///
    /// # Errors
    /// Store errors end the loop. Integrity errors (`JobNotFound`) must not be retried.
    pub async fn run(&mut self, mut shutdown: ShutdownToken) -> Result<HaltReason> {
        self.config.validate()?;
        info!(
            max_jobs = self.config.max_jobs,
            max_attempts = self.config.max_attempts,
            on_shutdown = %self.config.on_shutdown,
            "Worker started"
        );

        loop {
            if shutdown.is_shutdown() {
                return self.shut_down().await;
            }

            let step = match self.tick().await {
                Ok(step) => step,
                Err(AppError::LockInterrupted { .. }) if shutdown.is_shutdown() => {
                    info!("Shutdown requested while waiting for the queue lock");
                    return self.shut_down().await;
                }
                Err(e) => return Err(e),
            };

            match step {
                Step::Continue => {}
                Step::Sleep(duration) => {
                    let sleeper = Arc::clone(&self.sleeper);
                    let interrupted = tokio::select! {
                        _ = sleeper.sleep(duration) => false,
                        _ = shutdown.wait() => true,
                    };
                    if interrupted {
                        info!("Worker interrupted while sleeping");
                        return self.shut_down().await;
                    }
                }
                Step::Halt(reason) => {
                    info!(finished = self.finished_count, "Halting: {}", reason);
                    return Ok(reason);
                }
            }
        }
    }

    /// Advance the state machine by one step without sleeping
    pub async fn tick(&mut self) -> Result<Step> {
        if let WorkerState::Halted(reason) = self.state {
            return Ok(Step::Halt(reason));
        }

        if self.current.is_some() {
            return self.check_running().await;
        }

        if let Some(reason) = self.halt_condition() {
            return Ok(self.halt(reason));
        }

        self.poll().await
    }

    fn halt_condition(&self) -> Option<HaltReason> {
        if self.config.max_jobs != constants::UNLIMITED_JOBS
            && self.finished_count >= self.config.max_jobs
        {
            return Some(HaltReason::JobLimitReached);
        }
        if self.attempts >= self.config.max_attempts {
            return Some(HaltReason::AttemptsExhausted {
                attempts: self.attempts,
            });
        }
        None
    }

    fn halt(&mut self, reason: HaltReason) -> Step {
        self.state = WorkerState::Halted(reason);
        Step::Halt(reason)
    }

    async fn poll(&mut self) -> Result<Step> {
        self.state = WorkerState::Polling;

        match self.store.claim_first_pending().await? {
            Some(job) => {
                self.attempts = 0;
                self.start(job).await
            }
            None => {
                self.attempts += 1;
                self.state = WorkerState::Idle;

                if let Some(reason) = self.halt_condition() {
                    return Ok(self.halt(reason));
                }

                info!(
                    attempt = self.attempts,
                    max_attempts = self.config.max_attempts,
                    backoff_ms = self.config.idle_backoff.as_millis() as u64,
                    "No job found, backing off"
                );
                Ok(Step::Sleep(self.config.idle_backoff))
            }
        }
    }

    async fn start(&mut self, job: Job) -> Result<Step> {
        match self.executor.spawn(&job) {
            Ok(task) => {
                info!(job = %job, pid = ?task.pid(), "Starting job");
                self.current = Some(ActiveJob { job, task });
                self.state = WorkerState::Running;
            }
            Err(e) => {
                // A broken command would otherwise be claimed forever
                error!(job = %job, error = %e, "Job could not be started, marking it completed");
                self.finish(job).await?;
            }
        }
        Ok(Step::Continue)
    }

    async fn check_running(&mut self) -> Result<Step> {
        let outcome = match self.current.as_mut() {
            Some(active) => active.task.try_wait(),
            None => return Ok(Step::Continue),
        };

        match outcome {
            Ok(None) => Ok(Step::Sleep(self.config.poll_interval)),
            Ok(Some(result)) => {
                if let Some(active) = self.current.take() {
                    info!(
                        job = %active.job,
                        exit_code = ?result.exit_code,
                        status = ?result.status,
                        duration_ms = result.duration_ms,
                        "Job finished"
                    );
                    self.finish(active.job).await?;
                }
                Ok(Step::Continue)
            }
            Err(e) => {
                if let Some(active) = self.current.take() {
                    error!(
                        job = %active.job,
                        error = %e,
                        "Lost track of job process, marking it completed"
                    );
                    self.finish(active.job).await?;
                }
                Ok(Step::Continue)
            }
        }
    }

    async fn finish(&mut self, job: Job) -> Result<()> {
        self.state = WorkerState::Completing;
        self.store.complete(&job).await?;
        self.finished_count += 1;
        self.state = WorkerState::Idle;
        info!(
            job = %job,
            finished = self.finished_count,
            "Job moved to completed"
        );
        Ok(())
    }

    async fn shut_down(&mut self) -> Result<HaltReason> {
        if let Some(mut active) = self.current.take() {
            match active.task.try_wait() {
                Ok(None) => self.release(active).await?,
                Ok(Some(result)) => {
                    info!(
                        job = %active.job,
                        exit_code = ?result.exit_code,
                        "Job finished before shutdown"
                    );
                    self.finish(active.job).await?;
                }
                Err(e) => {
                    error!(
                        job = %active.job,
                        error = %e,
                        "Lost track of job process, marking it completed"
                    );
                    self.finish(active.job).await?;
                }
            }
        }

        let reason = HaltReason::ShutdownRequested;
        self.state = WorkerState::Halted(reason);
        info!(finished = self.finished_count, "Halting: {}", reason);
        Ok(reason)
    }

    /// Hand a still-running job over according to the shutdown policy
    async fn release(&mut self, mut active: ActiveJob) -> Result<()> {
        match self.config.on_shutdown {
            ShutdownPolicy::Orphan => {
                warn!(
                    job = %active.job,
                    pid = ?active.task.pid(),
                    "Leaving job running; it stays in the in-progress list"
                );
            }
            ShutdownPolicy::Terminate => {
                info!(job = %active.job, pid = ?active.task.pid(), "Terminating job");
                match active.task.terminate().await {
                    Ok(()) => {
                        self.store.requeue(&active.job).await?;
                        info!(job = %active.job, "Job returned to the pending list");
                    }
                    Err(e) => {
                        error!(
                            job = %active.job,
                            error = %e,
                            "Job could not be terminated; it stays in the in-progress list"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueList;
    use crate::port::queue_store::mocks::InMemoryQueueStore;
    use crate::port::task_executor::mocks::{MockBehavior, MockTaskExecutor};
    use crate::port::time_provider::mocks::ManualClock;

    fn job(command: &str) -> Job {
        Job::new(command).unwrap()
    }

    fn worker(
        store: &Arc<InMemoryQueueStore>,
        executor: &Arc<MockTaskExecutor>,
        clock: &Arc<ManualClock>,
        config: WorkerConfig,
    ) -> Worker {
        Worker::new(store.clone(), executor.clone(), clock.clone(), config)
    }

    #[tokio::test]
    async fn test_runs_jobs_in_order_until_job_limit() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["echo a", "echo b"]));
        let executor = Arc::new(MockTaskExecutor::new_exit_after(2, 0));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default().with_max_jobs(2));
        let (_tx, token) = shutdown_channel();

        let reason = worker.run(token).await.unwrap();

        assert_eq!(reason, HaltReason::JobLimitReached);
        assert_eq!(reason.to_string(), "finished the pre-set number of jobs");
        let lists = store.lists();
        assert!(lists.pending.is_empty());
        assert!(lists.in_progress.is_empty());
        assert_eq!(lists.completed, vec![job("echo a"), job("echo b")]);
        assert_eq!(worker.finished_count(), 2);
        // two liveness sleeps per job, never an idle backoff
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 4]);
    }

    #[tokio::test]
    async fn test_empty_queue_halts_after_five_attempts() {
        let store = Arc::new(InMemoryQueueStore::new());
        let executor = Arc::new(MockTaskExecutor::new_success());
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());
        let (_tx, token) = shutdown_channel();

        let reason = worker.run(token).await.unwrap();

        assert_eq!(reason, HaltReason::AttemptsExhausted { attempts: 5 });
        assert_eq!(reason.to_string(), "no job found after 5 attempts");
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 4]);
        assert_eq!(store.lists().total(), 0);
        assert!(executor.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_tick_walks_through_states() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["sleep 2"]));
        let executor = Arc::new(MockTaskExecutor::new_exit_after(2, 0));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());
        assert_eq!(worker.state(), WorkerState::Idle);

        assert_eq!(worker.tick().await.unwrap(), Step::Continue);
        assert_eq!(worker.state(), WorkerState::Running);
        assert_eq!(worker.current_job(), Some(&job("sleep 2")));
        assert_eq!(store.lists().in_progress, vec![job("sleep 2")]);

        let liveness = Step::Sleep(Duration::from_secs(1));
        assert_eq!(worker.tick().await.unwrap(), liveness);
        assert_eq!(worker.tick().await.unwrap(), liveness);

        assert_eq!(worker.tick().await.unwrap(), Step::Continue);
        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.current_job(), None);
        assert_eq!(worker.finished_count(), 1);
        assert_eq!(store.lists().completed, vec![job("sleep 2")]);
    }

    #[tokio::test]
    async fn test_successful_claim_resets_attempts() {
        let store = Arc::new(InMemoryQueueStore::new());
        let executor = Arc::new(MockTaskExecutor::new_success());
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());

        worker.tick().await.unwrap();
        worker.tick().await.unwrap();
        assert_eq!(worker.attempts(), 2);

        store.enqueue(&[job("echo late")]).await.unwrap();
        worker.tick().await.unwrap();

        assert_eq!(worker.attempts(), 0);
        assert_eq!(worker.state(), WorkerState::Running);
    }

    #[tokio::test]
    async fn test_never_claims_second_job_while_running() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["job 1", "job 2"]));
        let executor = Arc::new(MockTaskExecutor::new_exit_after(3, 0));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());

        for _ in 0..4 {
            worker.tick().await.unwrap();
            let lists = store.lists();
            assert_eq!(lists.in_progress, vec![job("job 1")]);
            assert_eq!(lists.pending, vec![job("job 2")]);
        }
        assert_eq!(executor.spawned(), vec![job("job 1")]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_still_completes() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["false"]));
        let executor = Arc::new(MockTaskExecutor::new_exit_after(0, 1));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default().with_max_jobs(1));
        let (_tx, token) = shutdown_channel();

        let reason = worker.run(token).await.unwrap();

        assert_eq!(reason, HaltReason::JobLimitReached);
        assert_eq!(store.lists().completed, vec![job("false")]);
    }

    #[tokio::test]
    async fn test_spawn_failure_consumes_job() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["broken", "echo ok"]));
        let executor = Arc::new(MockTaskExecutor::new_spawn_fail("no shell"));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());

        assert_eq!(worker.tick().await.unwrap(), Step::Continue);

        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.finished_count(), 1);
        let lists = store.lists();
        assert_eq!(lists.completed, vec![job("broken")]);
        assert_eq!(lists.pending, vec![job("echo ok")]);
        assert!(executor.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_wait_failure_completes_job() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["echo a"]));
        let executor = Arc::new(MockTaskExecutor::new(MockBehavior::WaitFail(
            "waitpid failed".to_string(),
        )));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());

        worker.tick().await.unwrap();
        worker.tick().await.unwrap();

        assert_eq!(store.lists().completed, vec![job("echo a")]);
        assert_eq!(worker.finished_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_in_progress_line_is_fatal() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["echo a"]));
        let executor = Arc::new(MockTaskExecutor::new_exit_after(1, 0));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());
        let (_tx, token) = shutdown_channel();

        worker.tick().await.unwrap();
        // someone else already moved the line
        store
            .move_job(&job("echo a"), QueueList::InProgress, QueueList::Completed)
            .await
            .unwrap();

        let err = worker.run(token).await.unwrap_err();

        assert!(err.is_integrity_violation());
        assert_eq!(worker.finished_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_orphans_running_job_by_default() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["sleep 100"]));
        let executor = Arc::new(MockTaskExecutor::new_exit_after(usize::MAX, 0));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());
        let (tx, token) = shutdown_channel();

        worker.tick().await.unwrap();
        tx.shutdown();
        let reason = worker.run(token).await.unwrap();

        assert_eq!(reason, HaltReason::ShutdownRequested);
        assert_eq!(worker.state(), WorkerState::Halted(reason));
        assert_eq!(store.lists().in_progress, vec![job("sleep 100")]);
        assert!(executor.terminated().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_terminate_requeues_job() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["sleep 100", "echo next"]));
        let executor = Arc::new(MockTaskExecutor::new_exit_after(usize::MAX, 0));
        let clock = Arc::new(ManualClock::default());
        let config = WorkerConfig {
            on_shutdown: ShutdownPolicy::Terminate,
            ..Default::default()
        };
        let mut worker = worker(&store, &executor, &clock, config);
        let (tx, token) = shutdown_channel();

        worker.tick().await.unwrap();
        tx.shutdown();
        worker.run(token).await.unwrap();

        assert_eq!(executor.terminated(), vec![job("sleep 100")]);
        let lists = store.lists();
        assert!(lists.in_progress.is_empty());
        assert_eq!(lists.pending, vec![job("echo next"), job("sleep 100")]);
    }

    #[tokio::test]
    async fn test_shutdown_completes_job_that_already_exited() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["echo ran", "echo next"]));
        let executor = Arc::new(MockTaskExecutor::new_success());
        let clock = Arc::new(ManualClock::default());
        let config = WorkerConfig {
            on_shutdown: ShutdownPolicy::Terminate,
            ..Default::default()
        };
        let mut worker = worker(&store, &executor, &clock, config);
        let (tx, token) = shutdown_channel();

        // spawned; the exit has not been observed yet
        worker.tick().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Running);
        tx.shutdown();
        let reason = worker.run(token).await.unwrap();

        assert_eq!(reason, HaltReason::ShutdownRequested);
        assert!(executor.terminated().is_empty());
        assert_eq!(worker.finished_count(), 1);
        let lists = store.lists();
        assert_eq!(lists.pending, vec![job("echo next")]);
        assert!(lists.in_progress.is_empty());
        assert_eq!(lists.completed, vec![job("echo ran")]);
    }

    #[tokio::test]
    async fn test_orphan_policy_completes_job_that_already_exited() {
        let store = Arc::new(InMemoryQueueStore::with_pending(["echo ran"]));
        let executor = Arc::new(MockTaskExecutor::new_exit_after(0, 3));
        let clock = Arc::new(ManualClock::default());
        let mut worker = worker(&store, &executor, &clock, WorkerConfig::default());
        let (tx, token) = shutdown_channel();

        worker.tick().await.unwrap();
        tx.shutdown();
        worker.run(token).await.unwrap();

        let lists = store.lists();
        assert!(lists.in_progress.is_empty());
        assert_eq!(lists.completed, vec![job("echo ran")]);
    }

    #[tokio::test]
    async fn test_zero_max_attempts_is_rejected() {
        let store = Arc::new(InMemoryQueueStore::new());
        let executor = Arc::new(MockTaskExecutor::new_success());
        let clock = Arc::new(ManualClock::default());
        let config = WorkerConfig {
            max_attempts: 0,
            ..Default::default()
        };
        let mut worker = worker(&store, &executor, &clock, config);
        let (_tx, token) = shutdown_channel();

        assert!(worker.run(token).await.is_err());
    }
}
