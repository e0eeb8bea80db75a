// Domain Layer - Pure queue entities

pub mod error;
pub mod job;
pub mod queue;

// Re-exports
pub use error::DomainError;
pub use job::Job;
pub use queue::{QueueList, QueueSnapshot};
