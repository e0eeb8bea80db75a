// Application Layer - Use Cases

pub mod worker;

// Re-exports
pub use worker::{
    shutdown_channel, HaltReason, ShutdownPolicy, ShutdownSender, ShutdownToken, Step, Worker,
    WorkerConfig, WorkerState,
};
