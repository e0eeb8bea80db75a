// Worker configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::constants::*;

/// What happens to a running child when the worker is asked to shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Leave the child running; its line stays in the in-progress list
    #[default]
    Orphan,
    /// Stop the child's process group and return the job to the pending list
    Terminate,
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownPolicy::Orphan => write!(f, "orphan"),
            ShutdownPolicy::Terminate => write!(f, "terminate"),
        }
    }
}

impl FromStr for ShutdownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orphan" => Ok(ShutdownPolicy::Orphan),
            "terminate" => Ok(ShutdownPolicy::Terminate),
            other => Err(format!(
                "unknown shutdown policy '{}' (expected 'orphan' or 'terminate')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Halt after this many finished jobs (0 = unlimited)
    pub max_jobs: u64,
    /// Halt after this many consecutive empty polls
    pub max_attempts: u32,
    pub idle_backoff: Duration,
    pub poll_interval: Duration,
    pub on_shutdown: ShutdownPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_jobs: UNLIMITED_JOBS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            idle_backoff: IDLE_BACKOFF_DURATION,
            poll_interval: POLL_INTERVAL_DURATION,
            on_shutdown: ShutdownPolicy::default(),
        }
    }
}

impl WorkerConfig {
    pub fn with_max_jobs(mut self, max_jobs: u64) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_attempts == 0 {
            return Err(crate::AppError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_jobs, 0);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.idle_backoff, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.on_shutdown, ShutdownPolicy::Orphan);
    }

    #[test]
    fn test_shutdown_policy_parse() {
        assert_eq!(
            "TERMINATE".parse::<ShutdownPolicy>(),
            Ok(ShutdownPolicy::Terminate)
        );
        assert!("kill".parse::<ShutdownPolicy>().is_err());
    }
}
