//! Command implementations for shopsync.

mod completions;
mod daemon;
mod queue;

pub use completions::completions;
pub use daemon::daemon;
pub use queue::{clear_failed, enqueue, list, remove, retry, run, status};
