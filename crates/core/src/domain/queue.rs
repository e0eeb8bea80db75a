// Queue Domain Model

use serde::Serialize;
use std::fmt;

use super::job::Job;

/// The three lists a job moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueList {
    Pending,
    InProgress,
    Completed,
}

impl QueueList {
    pub const ALL: [QueueList; 3] = [
        QueueList::Pending,
        QueueList::InProgress,
        QueueList::Completed,
    ];

    /// File name inside the queue directory. Fixed for compatibility with producers.
    pub fn file_name(&self) -> &'static str {
        match self {
            QueueList::Pending => "todo.txt",
            QueueList::InProgress => "doing.txt",
            QueueList::Completed => "done.txt",
        }
    }
}

impl fmt::Display for QueueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueList::Pending => write!(f, "pending"),
            QueueList::InProgress => write!(f, "in-progress"),
            QueueList::Completed => write!(f, "completed"),
        }
    }
}

/// Contents of all three lists, read under one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub pending: Vec<Job>,
    pub in_progress: Vec<Job>,
    pub completed: Vec<Job>,
}

impl QueueSnapshot {
    pub fn list(&self, list: QueueList) -> &[Job] {
        match list {
            QueueList::Pending => &self.pending,
            QueueList::InProgress => &self.in_progress,
            QueueList::Completed => &self.completed,
        }
    }

    pub fn list_mut(&mut self, list: QueueList) -> &mut Vec<Job> {
        match list {
            QueueList::Pending => &mut self.pending,
            QueueList::InProgress => &mut self.in_progress,
            QueueList::Completed => &mut self.completed,
        }
    }

    /// Total number of job lines across all lists
    pub fn total(&self) -> usize {
        self.pending.len() + self.in_progress.len() + self.completed.len()
    }

    /// All jobs regardless of list, sorted (multiset view for invariant checks)
    pub fn all_jobs_sorted(&self) -> Vec<Job> {
        let mut all: Vec<Job> = QueueList::ALL
            .iter()
            .flat_map(|l| self.list(*l).iter().cloned())
            .collect();
        all.sort();
        all
    }
}
