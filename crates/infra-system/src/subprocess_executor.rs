// Shell executor implementation
// reason: tokio::process for non-blocking liveness checks, nix for process-group signals
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use filejob_core::application::worker::constants::GRACEFUL_SHUTDOWN_TIMEOUT_MS;
use filejob_core::domain::Job;
use filejob_core::port::task_executor::{
    ExecutionError, ExecutionResult, ExecutionStatus, RunningTask, TaskExecutor,
};
use filejob_core::port::TimeProvider;

#[cfg(unix)]
pub const DEFAULT_SHELL: &str = "/bin/sh";
#[cfg(windows)]
pub const DEFAULT_SHELL: &str = "cmd";

/// Interval between liveness checks while waiting for a terminated job to exit
const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs each job line through the host shell (`<shell> -c <line>`)
///
/// The job's stdout/stderr are inherited, stdin is closed. On unix every job is
/// the leader of a new process group, so the whole tree it starts can be signalled
/// at once and a Ctrl-C aimed at the worker does not reach the job.
pub struct ShellExecutor {
    time_provider: Arc<dyn TimeProvider>,
    shell: PathBuf,
}

impl ShellExecutor {
    /// Create a new shell executor
    ///
    /// # Example
    /// ```ignore
    /// let executor = ShellExecutor::new(Arc::new(SystemTimeProvider), "/bin/bash");
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>, shell: impl Into<PathBuf>) -> Self {
        Self {
            time_provider,
            shell: shell.into(),
        }
    }

    pub fn with_default_shell(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::new(time_provider, DEFAULT_SHELL)
    }

    fn command(&self, job: &Job) -> Command {
        let mut command = Command::new(&self.shell);

        #[cfg(unix)]
        {
            command.arg("-c").arg(job.as_str()).process_group(0);
        }

        #[cfg(windows)]
        {
            command.arg("/C").arg(job.as_str());
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);
        command
    }
}

impl TaskExecutor for ShellExecutor {
    fn spawn(&self, job: &Job) -> Result<Box<dyn RunningTask>, ExecutionError> {
        let child = self
            .command(job)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", self.shell.display(), e)))?;

        info!(
            job = %job,
            shell = %self.shell.display(),
            pid = ?child.id(),
            "Spawned shell process"
        );

        Ok(Box::new(ShellTask {
            pid: child.id(),
            child,
            started_at: self.time_provider.now_millis(),
            time_provider: Arc::clone(&self.time_provider),
        }))
    }
}

/// A job running under the shell
struct ShellTask {
    child: Child,
    /// Cached: tokio forgets the pid once the child has been reaped
    pid: Option<u32>,
    started_at: i64,
    time_provider: Arc<dyn TimeProvider>,
}

impl ShellTask {
    fn build_result(&self, status: ExitStatus) -> ExecutionResult {
        let duration_ms = self.time_provider.now_millis() - self.started_at;
        ExecutionResult {
            status: classify(&status),
            duration_ms,
            exit_code: status.code(),
        }
    }

    /// SIGTERM the process group first, then SIGKILL if it is still alive
    #[cfg(unix)]
    async fn kill_graceful(&mut self) -> Result<(), ExecutionError> {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return Ok(());
        };
        let group = Pid::from_raw(pid as i32);

        // Step 1: Send SIGTERM for graceful shutdown
        info!(pid = %pid, "Sending SIGTERM to job process group");
        match killpg(group, Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(ExecutionError::Killed(format!("SIGTERM failed: {}", e))),
        }

        // Step 2: Wait for the leader to exit
        let start_time = self.time_provider.now_millis();
        loop {
            if self.try_reap()?.is_some() {
                info!(pid = %pid, "Job exited after SIGTERM");
                // children that ignored SIGTERM must not outlive the job
                let _ = killpg(group, Signal::SIGKILL);
                return Ok(());
            }

            // Timeout: force kill with SIGKILL
            if self.time_provider.now_millis() - start_time > GRACEFUL_SHUTDOWN_TIMEOUT_MS {
                warn!(pid = %pid, "Job did not exit after SIGTERM, sending SIGKILL");
                match killpg(group, Signal::SIGKILL) {
                    Ok(()) | Err(Errno::ESRCH) => {}
                    Err(e) => {
                        return Err(ExecutionError::Killed(format!("SIGKILL failed: {}", e)))
                    }
                }
                self.child
                    .wait()
                    .await
                    .map_err(|e| ExecutionError::IoError(e.to_string()))?;
                return Ok(());
            }

            tokio::time::sleep(TERMINATE_POLL_INTERVAL).await;
        }
    }

    #[cfg(windows)]
    async fn kill_graceful(&mut self) -> Result<(), ExecutionError> {
        info!(pid = ?self.pid, "Killing job process");
        self.child
            .kill()
            .await
            .map_err(|e| ExecutionError::Killed(e.to_string()))
    }

    fn try_reap(&mut self) -> Result<Option<ExitStatus>, ExecutionError> {
        self.child
            .try_wait()
            .map_err(|e| ExecutionError::IoError(e.to_string()))
    }
}

#[async_trait]
impl RunningTask for ShellTask {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn try_wait(&mut self) -> Result<Option<ExecutionResult>, ExecutionError> {
        Ok(self.try_reap()?.map(|status| self.build_result(status)))
    }

    async fn terminate(&mut self) -> Result<(), ExecutionError> {
        self.kill_graceful().await
    }
}

fn classify(status: &ExitStatus) -> ExecutionStatus {
    if status.success() {
        return ExecutionStatus::Success;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal().is_some() {
            return ExecutionStatus::Killed;
        }
    }

    ExecutionStatus::Failed
}
