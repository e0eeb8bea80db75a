// Job Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{DomainError, Result};

/// A queued shell command.
///
/// Identity is the exact command text. Surrounding whitespace is not part of the
/// job, so a line read back from a list file compares equal to the job that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Job(String);

impl Job {
    /// Create a job from a command line.
    ///
    /// # Errors
    /// - `DomainError::InvalidJob` if the command is blank or spans several lines
    pub fn new(command: impl Into<String>) -> Result<Self> {
        let command = command.into();
        let trimmed = command.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidJob("command is empty".to_string()));
        }
        if trimmed.contains('\n') || trimmed.contains('\r') {
            return Err(DomainError::InvalidJob(format!(
                "command must be a single line: {:?}",
                trimmed
            )));
        }

        if trimmed.len() == command.len() {
            Ok(Self(command))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Parse one line of a list file. Blank lines are not jobs.
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Job {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Job::new(value)
    }
}

impl From<Job> for String {
    fn from(job: Job) -> Self {
        job.0
    }
}
