// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Timed out after {waited_ms}ms waiting for lock {path}")]
    LockTimeout { path: String, waited_ms: u64 },

    #[error("Shutdown requested while waiting for lock {path}")]
    LockInterrupted { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the queue files disagree with the caller's bookkeeping.
    ///
    /// These errors are never retried: continuing would risk running a job twice
    /// or losing one.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            AppError::Domain(crate::domain::DomainError::JobNotFound { .. })
                | AppError::Domain(crate::domain::DomainError::LineTooLong { .. })
        )
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
