//! The semaphore the VM task idles on, and the handle other contexts wake it with.

use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};
use vmwake_rtos::CountingSemaphore;

use crate::counters::BridgeCounters;
use crate::error::{BridgeError, BridgeResult, Operation};

/// Block/wake handshake for the VM task.
///
/// A release posted before the VM blocks is banked, so the next [`wait`](Self::wait)
/// returns at once and no wakeup is lost.
pub struct WakeSignal<S> {
    semaphore: Arc<S>,
    counters: Arc<BridgeCounters>,
}

impl<S: CountingSemaphore> WakeSignal<S> {
    pub(crate) fn new(semaphore: S, counters: Arc<BridgeCounters>) -> Self {
        Self {
            semaphore: Arc::new(semaphore),
            counters,
        }
    }

    /// Block until a release is available and consume it.
    ///
    /// # Errors
    ///
    /// Returns a wait error if the platform rejects the pend.
    pub fn wait(&self) -> BridgeResult<()> {
        self.counters.inc_idle();
        trace!("VM task idle");
        self.semaphore.pend().map_err(|source| {
            self.counters.inc_failure();
            warn!(error = %source, "wake signal wait failed");
            BridgeError::operation(Operation::Wait, source)
        })
    }

    /// Release every waiter, or bank one release if none is waiting.
    ///
    /// # Errors
    ///
    /// Returns a post error if the platform rejects the release.
    pub fn release(&self) -> BridgeResult<()> {
        post(&*self.semaphore, &self.counters)
    }

    /// Releases currently banked.
    #[must_use]
    pub fn pending_releases(&self) -> u32 {
        self.semaphore.count()
    }

    /// The wrapped platform semaphore.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.semaphore
    }

    /// A cloneable handle that can release this signal from any context.
    #[must_use]
    pub fn handle(&self) -> WakeHandle<S> {
        WakeHandle {
            semaphore: Arc::clone(&self.semaphore),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<S> fmt::Debug for WakeSignal<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeSignal").finish_non_exhaustive()
    }
}

/// Wakes the VM task from an external event source.
///
/// Safe to call from any thread or callback context; it never blocks.
pub struct WakeHandle<S> {
    semaphore: Arc<S>,
    counters: Arc<BridgeCounters>,
}

impl<S: CountingSemaphore> WakeHandle<S> {
    /// Release the VM task.
    ///
    /// # Errors
    ///
    /// Returns a post error if the platform rejects the release.
    pub fn wakeup(&self) -> BridgeResult<()> {
        post(&*self.semaphore, &self.counters)
    }
}

impl<S> Clone for WakeHandle<S> {
    fn clone(&self) -> Self {
        Self {
            semaphore: Arc::clone(&self.semaphore),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<S> fmt::Debug for WakeHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeHandle").finish_non_exhaustive()
    }
}

fn post<S: CountingSemaphore>(semaphore: &S, counters: &BridgeCounters) -> BridgeResult<()> {
    match semaphore.post_all() {
        Ok(()) => {
            counters.inc_wakeup();
            trace!("VM task released");
            Ok(())
        }
        Err(source) => {
            counters.inc_failure();
            warn!(error = %source, "wake signal post failed");
            Err(BridgeError::operation(Operation::Post, source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use vmwake_rtos::{ManualRtos, Rtos};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_release_before_wait_is_banked() -> TestResult {
        let rtos = ManualRtos::new(1000);
        let counters = Arc::new(BridgeCounters::new());
        let signal = WakeSignal::new(rtos.create_semaphore("wake", 0)?, Arc::clone(&counters));

        signal.release()?;
        assert_eq!(signal.pending_releases(), 1);
        signal.wait()?;
        assert_eq!(signal.pending_releases(), 0);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.wakeups, 1);
        assert_eq!(snapshot.idles, 1);
        Ok(())
    }

    #[test]
    fn test_handle_wakes_blocked_waiter() -> TestResult {
        let rtos = ManualRtos::new(1000);
        let signal = Arc::new(WakeSignal::new(
            rtos.create_semaphore("wake", 0)?,
            Arc::new(BridgeCounters::new()),
        ));
        let handle = signal.handle();

        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };
        while signal.inner().waiters() == 0 {
            thread::yield_now();
        }
        handle.wakeup()?;
        assert!(matches!(waiter.join(), Ok(Ok(()))));
        Ok(())
    }

    #[test]
    fn test_failures_are_counted() -> TestResult {
        let rtos = ManualRtos::new(1000);
        let counters = Arc::new(BridgeCounters::new());
        let signal = WakeSignal::new(rtos.create_semaphore("wake", 0)?, Arc::clone(&counters));

        rtos.faults().fail_post(true);
        assert!(matches!(
            signal.release(),
            Err(BridgeError::PrimitiveOperation {
                operation: Operation::Post,
                ..
            })
        ));
        rtos.faults().fail_pend(true);
        assert!(matches!(signal.wait(), Err(BridgeError::PrimitiveOperation { .. })));
        assert_eq!(counters.snapshot().failures, 2);
        Ok(())
    }
}
