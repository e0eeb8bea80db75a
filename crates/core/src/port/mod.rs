// Port Layer - Interfaces for external dependencies

pub mod queue_store;
pub mod sleeper;
pub mod task_executor;
pub mod time_provider;

// Re-exports
pub use queue_store::QueueStore;
pub use sleeper::Sleeper;
pub use task_executor::{
    ExecutionError, ExecutionResult, ExecutionStatus, RunningTask, TaskExecutor,
};
pub use time_provider::TimeProvider;
