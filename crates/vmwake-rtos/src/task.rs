//! Opaque execution-context identifiers.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_TASK_ID: TaskId = TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed));
}

/// Identifier of an execution context, for diagnostics only.
///
/// Two distinct threads never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Id of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        CURRENT_TASK_ID.with(|id| *id)
    }

    /// Raw value, suitable for logging.
    #[inline]
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
