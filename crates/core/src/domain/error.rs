// Domain Error Types

use super::queue::QueueList;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Job '{job}' not found in {list} list")]
    JobNotFound { job: String, list: QueueList },

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Line in {list} list exceeds {limit} bytes")]
    LineTooLong { list: QueueList, limit: usize },
}

pub type Result<T> = std::result::Result<T, DomainError>;
