// Lock sentinel
//
// Mutual exclusion across processes sharing a directory: the lock is held by
// whoever managed to create `.lock`. Creation uses O_CREAT|O_EXCL (`create_new`),
// a single atomic filesystem operation, so two contenders can never both succeed.
//
// Limitation: a holder that dies without running destructors (SIGKILL, power loss)
// leaves the sentinel behind and every other worker waits on it forever (or until
// its lock timeout). A stale sentinel has to be removed by hand, e.g. with
// `filejob unlock <basedir>`.
//
// A shutdown token interrupts waits that are in progress when shutdown is
// requested. Waits that start after the request (the shutdown path itself) are not
// interrupted.

use filejob_core::application::worker::constants::LOCK_RETRY_INTERVAL;
use filejob_core::application::ShutdownToken;
use filejob_core::error::{AppError, Result};
use filejob_core::port::{Sleeper, TimeProvider};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Give up after this long; `None` waits forever
    pub timeout: Option<Duration>,
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            retry_interval: LOCK_RETRY_INTERVAL,
        }
    }
}

pub struct SentinelLock {
    path: PathBuf,
    options: LockOptions,
    time_provider: Arc<dyn TimeProvider>,
    sleeper: Arc<dyn Sleeper>,
    shutdown: Option<ShutdownToken>,
}

impl SentinelLock {
    pub fn new(
        path: impl Into<PathBuf>,
        options: LockOptions,
        time_provider: Arc<dyn TimeProvider>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            path: path.into(),
            options,
            time_provider,
            sleeper,
            shutdown: None,
        }
    }

    /// Give up waiting (with `AppError::LockInterrupted`) once `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: ShutdownToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the sentinel, retrying while another holder has it
    ///
    /// Cancel-safe: the sentinel is created by one synchronous `O_EXCL` open, so
    /// a guard owns it as soon as it exists.
    ///
    /// # Errors
    /// - `AppError::LockTimeout` if `options.timeout` elapses first
    /// - `AppError::LockInterrupted` if shutdown is requested while waiting
    /// - `AppError::Io` for any failure other than "already exists"
    pub async fn acquire(&self) -> Result<LockGuard> {
        let started = self.time_provider.now_millis();
        let mut reported = false;
        let mut shutdown = self
            .shutdown
            .clone()
            .filter(|token| !token.is_shutdown());

        loop {
            match self.try_create() {
                Ok(guard) => {
                    debug!(path = %self.path.display(), "Lock acquired");
                    return Ok(guard);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            let waited_ms = (self.time_provider.now_millis() - started).max(0) as u64;
            if let Some(timeout) = self.options.timeout {
                if waited_ms >= timeout.as_millis() as u64 {
                    return Err(AppError::LockTimeout {
                        path: self.path.display().to_string(),
                        waited_ms,
                    });
                }
            }

            if !reported {
                info!(path = %self.path.display(), "Queue directory is locked, waiting");
                reported = true;
            }

            match shutdown.as_mut() {
                Some(token) => {
                    let interrupted = tokio::select! {
                        _ = self.sleeper.sleep(self.options.retry_interval) => false,
                        _ = token.wait() => true,
                    };
                    if interrupted {
                        info!(path = %self.path.display(), waited_ms, "Stopped waiting for lock");
                        return Err(AppError::LockInterrupted {
                            path: self.path.display().to_string(),
                        });
                    }
                }
                None => self.sleeper.sleep(self.options.retry_interval).await,
            }
        }
    }

    fn try_create(&self) -> io::Result<LockGuard> {
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        Ok(LockGuard {
            path: self.path.clone(),
        })
    }

    /// Delete the sentinel regardless of who created it
    ///
    /// Returns whether a sentinel was present. Only for clearing a stale lock.
    pub async fn break_lock(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn is_locked(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }
}

/// Held lock; dropping it deletes the sentinel
///
/// Release happens on every way out of the critical section: normal return, `?`
/// propagation, panic unwinding, or the owning future being dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Lock released"),
            Err(e) => error!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove lock sentinel"
            ),
        }
    }
}
