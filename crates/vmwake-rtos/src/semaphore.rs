//! Counting semaphore contract and its software implementation.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{RtosError, RtosResult};

/// A counting semaphore with infinite wait and release-all-waiters post.
///
/// # Contract
///
/// - `pend` blocks without timeout until a release is available, then consumes one.
/// - `post_all` releases every task currently blocked in `pend`. When no task is
///   blocked it banks a single release, so a post that precedes the wait is not lost.
/// - `post_all` never blocks and may be called from the timer-service context.
pub trait CountingSemaphore: Send + Sync {
    /// Block until a release is available and consume it.
    ///
    /// # Errors
    ///
    /// Returns an error only on a platform fault, never on an ordinary wake.
    fn pend(&self) -> RtosResult<()>;

    /// Release all current waiters (or bank one release if none).
    ///
    /// # Errors
    ///
    /// Returns an error if the release cannot be posted.
    fn post_all(&self) -> RtosResult<()>;

    /// Releases currently banked.
    fn count(&self) -> u32;
}

#[derive(Debug, Default)]
struct SemaphoreState {
    count: u32,
    waiters: u32,
}

/// Semaphore built on `parking_lot` primitives.
///
/// # Example
///
/// ```rust
/// use vmwake_rtos::{CountingSemaphore, SoftwareSemaphore};
///
/// let semaphore = SoftwareSemaphore::new("wake", 0);
/// semaphore.post_all()?;
/// semaphore.post_all()?;
/// assert_eq!(semaphore.count(), 2);
///
/// semaphore.pend()?;
/// assert_eq!(semaphore.count(), 1);
/// # Ok::<(), vmwake_rtos::RtosError>(())
/// ```
#[derive(Debug)]
pub struct SoftwareSemaphore {
    name: &'static str,
    state: Mutex<SemaphoreState>,
    available: Condvar,
}

impl SoftwareSemaphore {
    /// Create a semaphore holding `initial_count` releases.
    #[must_use]
    pub fn new(name: &'static str, initial_count: u32) -> Self {
        Self {
            name,
            state: Mutex::new(SemaphoreState {
                count: initial_count,
                waiters: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Name given at creation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of tasks currently blocked in `pend`.
    #[must_use]
    pub fn waiters(&self) -> u32 {
        self.state.lock().waiters
    }

    /// Consume a release if one is banked, without blocking.
    pub fn try_pend(&self) -> bool {
        let mut state = self.state.lock();
        if state.count == 0 {
            return false;
        }
        state.count = state.count.saturating_sub(1);
        true
    }

    /// Wait at most `timeout` for a release.
    ///
    /// Returns `true` if a release was consumed.
    pub fn pend_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        state.waiters = state.waiters.saturating_add(1);
        while state.count == 0 {
            let timed_out = match deadline {
                Some(deadline) => self.available.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.available.wait(&mut state);
                    false
                }
            };
            if timed_out && state.count == 0 {
                state.waiters = state.waiters.saturating_sub(1);
                return false;
            }
        }
        state.count = state.count.saturating_sub(1);
        state.waiters = state.waiters.saturating_sub(1);
        true
    }
}

impl CountingSemaphore for SoftwareSemaphore {
    fn pend(&self) -> RtosResult<()> {
        let mut state = self.state.lock();
        state.waiters = state.waiters.saturating_add(1);
        while state.count == 0 {
            self.available.wait(&mut state);
        }
        state.count = state.count.saturating_sub(1);
        state.waiters = state.waiters.saturating_sub(1);
        Ok(())
    }

    fn post_all(&self) -> RtosResult<()> {
        let mut state = self.state.lock();
        // Waiters not yet covered by a banked release
        let blocked = state.waiters.saturating_sub(state.count);
        let releases = blocked.max(1);
        state.count = state
            .count
            .checked_add(releases)
            .ok_or(RtosError::CountOverflow)?;
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    fn count(&self) -> u32 {
        self.state.lock().count
    }
}
