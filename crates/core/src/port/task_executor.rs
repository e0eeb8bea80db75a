// Task Executor Port
// Abstraction for launching a job as a child process and watching it exit

use crate::domain::Job;
use async_trait::async_trait;
use thiserror::Error;

/// Result of a finished task
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
}

/// Execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed,
    Killed,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process killed: {0}")]
    Killed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Handle to one live child process.
///
/// Owned exclusively by the worker that spawned it; nothing else waits on or
/// signals the child.
#[async_trait]
pub trait RunningTask: Send {
    /// OS process ID, if the platform exposes one
    fn pid(&self) -> Option<u32>;

    /// Non-blocking liveness check.
    ///
    /// Returns `Ok(None)` while the child is running and the result once it exited.
    fn try_wait(&mut self) -> Result<Option<ExecutionResult>, ExecutionError>;

    /// Stop the child (and anything it started) and reap it.
    ///
    /// # Errors
    /// - ExecutionError::Killed if the process could not be signalled
    async fn terminate(&mut self) -> Result<(), ExecutionError>;
}

/// Task Executor trait
///
/// Implementations:
/// - ShellExecutor: runs the job line through the host shell
/// - MockTaskExecutor: scripted tasks for tests
pub trait TaskExecutor: Send + Sync {
    /// Start a job and return immediately with a handle to the running child
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    fn spawn(&self, job: &Job) -> Result<Box<dyn RunningTask>, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Task exits with `exit_code` after being polled `polls` times while running
        ExitAfter { polls: usize, exit_code: i32 },
        /// Spawning fails with message
        SpawnFail(String),
        /// try_wait fails with message
        WaitFail(String),
    }

    /// Mock Task Executor for testing
    pub struct MockTaskExecutor {
        behavior: Arc<Mutex<MockBehavior>>,
        spawned: Arc<Mutex<Vec<Job>>>,
        terminated: Arc<Mutex<Vec<Job>>>,
    }

    impl MockTaskExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                spawned: Arc::new(Mutex::new(Vec::new())),
                terminated: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::ExitAfter {
                polls: 0,
                exit_code: 0,
            })
        }

        pub fn new_exit_after(polls: usize, exit_code: i32) -> Self {
            Self::new(MockBehavior::ExitAfter { polls, exit_code })
        }

        pub fn new_spawn_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::SpawnFail(message.into()))
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        /// Jobs that were spawned, in order
        pub fn spawned(&self) -> Vec<Job> {
            self.spawned.lock().unwrap().clone()
        }

        /// Jobs whose task was terminated
        pub fn terminated(&self) -> Vec<Job> {
            self.terminated.lock().unwrap().clone()
        }
    }

    impl TaskExecutor for MockTaskExecutor {
        fn spawn(&self, job: &Job) -> Result<Box<dyn RunningTask>, ExecutionError> {
            let script = match self.behavior.lock().unwrap().clone() {
                MockBehavior::SpawnFail(msg) => return Err(ExecutionError::SpawnFailed(msg)),
                MockBehavior::ExitAfter { polls, exit_code } => {
                    TaskScript::ExitAfter { polls, exit_code }
                }
                MockBehavior::WaitFail(msg) => TaskScript::WaitFail(msg),
            };

            let mut spawned = self.spawned.lock().unwrap();
            spawned.push(job.clone());
            Ok(Box::new(MockRunningTask {
                job: job.clone(),
                pid: spawned.len() as u32,
                script,
                polls: 0,
                terminated: Arc::clone(&self.terminated),
            }))
        }
    }

    /// What a spawned mock task does; spawn failures never get this far
    enum TaskScript {
        ExitAfter { polls: usize, exit_code: i32 },
        WaitFail(String),
    }

    struct MockRunningTask {
        job: Job,
        pid: u32,
        script: TaskScript,
        polls: usize,
        terminated: Arc<Mutex<Vec<Job>>>,
    }

    #[async_trait]
    impl RunningTask for MockRunningTask {
        fn pid(&self) -> Option<u32> {
            Some(self.pid)
        }

        fn try_wait(&mut self) -> Result<Option<ExecutionResult>, ExecutionError> {
            match &self.script {
                TaskScript::ExitAfter { polls, exit_code } => {
                    if self.polls < *polls {
                        self.polls += 1;
                        return Ok(None);
                    }
                    let status = if *exit_code == 0 {
                        ExecutionStatus::Success
                    } else {
                        ExecutionStatus::Failed
                    };
                    Ok(Some(ExecutionResult {
                        status,
                        duration_ms: self.polls as i64 * 1000,
                        exit_code: Some(*exit_code),
                    }))
                }
                TaskScript::WaitFail(msg) => Err(ExecutionError::IoError(msg.clone())),
            }
        }

        async fn terminate(&mut self) -> Result<(), ExecutionError> {
            self.terminated.lock().unwrap().push(self.job.clone());
            Ok(())
        }
    }
}
