// filejob Infrastructure - Shared Directory Adapter
// Implements: QueueStore over todo.txt / doing.txt / done.txt guarded by a .lock sentinel

mod layout;
mod lines;
mod lock;
mod store;

pub use layout::QueueLayout;
pub use lock::{LockGuard, LockOptions, SentinelLock};
pub use store::{FileQueueStore, StoreOptions};
