// Command line and environment configuration

use clap::{Parser, ValueEnum};
use filejob_core::application::worker::constants::{
    DEFAULT_MAX_ATTEMPTS, IDLE_BACKOFF_DURATION, MAX_JOB_LINE_BYTES, POLL_INTERVAL_DURATION,
    UNLIMITED_JOBS,
};
use filejob_core::application::{ShutdownPolicy, WorkerConfig};
use filejob_infra_fs::{LockOptions, StoreOptions};
use filejob_infra_system::DEFAULT_SHELL;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "filejob-client")]
#[command(about = "Run shell commands from a shared queue directory, one at a time", long_about = None)]
#[command(version)]
pub struct Args {
    /// Queue directory holding todo.txt, doing.txt and done.txt
    pub basedir: String,

    /// Halt after finishing this many jobs (0 = unlimited)
    #[arg(long, default_value_t = UNLIMITED_JOBS)]
    pub max_jobs: u64,

    /// Halt after this many consecutive polls that find no job
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Seconds to sleep after a poll that found no job
    #[arg(long, default_value_t = IDLE_BACKOFF_DURATION.as_secs())]
    pub idle_backoff_secs: u64,

    /// Seconds between liveness checks of the running job
    #[arg(long, default_value_t = POLL_INTERVAL_DURATION.as_secs())]
    pub poll_interval_secs: u64,

    /// Give up waiting for the queue lock after this many seconds (default: wait forever)
    #[arg(long, env = "FILEJOB_LOCK_TIMEOUT_SECS")]
    pub lock_timeout_secs: Option<u64>,

    /// What to do with a running job on SIGINT/SIGTERM
    #[arg(long, value_enum, env = "FILEJOB_ON_SHUTDOWN", default_value_t = OnShutdown::Orphan)]
    pub on_shutdown: OnShutdown,

    /// Shell used to run each job line
    #[arg(long, env = "FILEJOB_SHELL", default_value = DEFAULT_SHELL)]
    pub shell: PathBuf,

    /// Log output format
    #[arg(long, value_enum, env = "FILEJOB_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnShutdown {
    /// Leave the job running and its line in doing.txt
    Orphan,
    /// Stop the job's process group and put the line back in todo.txt
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Args {
    /// Queue directory with a leading `~` expanded
    pub fn basedir_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.basedir).into_owned())
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            max_jobs: self.max_jobs,
            max_attempts: self.max_attempts,
            idle_backoff: Duration::from_secs(self.idle_backoff_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            on_shutdown: match self.on_shutdown {
                OnShutdown::Orphan => ShutdownPolicy::Orphan,
                OnShutdown::Terminate => ShutdownPolicy::Terminate,
            },
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            lock: LockOptions {
                timeout: self.lock_timeout_secs.map(Duration::from_secs),
                ..Default::default()
            },
            max_line_bytes: MAX_JOB_LINE_BYTES,
        }
    }
}
