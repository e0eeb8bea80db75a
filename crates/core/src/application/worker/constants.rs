// Worker and store constants (no magic values)
use std::time::Duration;

/// Consecutive empty polls before the worker halts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Sleep after a poll that found no job (5s)
pub const IDLE_BACKOFF_DURATION: Duration = Duration::from_secs(5);

/// Sleep between liveness checks of a running job (1s)
pub const POLL_INTERVAL_DURATION: Duration = Duration::from_secs(1);

/// Sleep between attempts to create the lock sentinel (1s)
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Longest accepted job line when claiming from the pending list
pub const MAX_JOB_LINE_BYTES: usize = 4096;

/// Grace period between SIGTERM and SIGKILL when terminating a job
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: i64 = 5000;

/// 0 means no limit on finished jobs
pub const UNLIMITED_JOBS: u64 = 0;
