// filejob Infrastructure - System Adapters
// Implements: TaskExecutor (jobs run through the host shell)

pub mod subprocess_executor;

pub use subprocess_executor::{ShellExecutor, DEFAULT_SHELL};
