//! Wall-clock tests against the threaded software RTOS.
//!
//! Deadlines are whole milliseconds on the bridge clock, so lower bounds allow for
//! the sub-millisecond part of the reading they were computed from.

use recorder::{Notifications, notifications};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vmwake_bridge::prelude::*;
use vmwake_rtos::{SoftwareRtos, SoftwareRtosConfig, TaskId};

type TestResult = Result<(), Box<dyn std::error::Error>>;

mod recorder {
    use parking_lot::{Condvar, Mutex};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use vmwake_rtos::TaskId;

    /// Records when, and from which context, the scheduler was notified.
    #[derive(Debug, Default)]
    pub struct Notifications {
        seen: Mutex<Vec<(Instant, TaskId)>>,
        changed: Condvar,
    }

    impl Notifications {
        pub fn record(&self) {
            self.seen.lock().push((Instant::now(), TaskId::current()));
            self.changed.notify_all();
        }

        pub fn count(&self) -> usize {
            self.seen.lock().len()
        }

        pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<(Instant, TaskId)> {
            let deadline = Instant::now() + timeout;
            let mut seen = self.seen.lock();
            while seen.len() < count {
                if self.changed.wait_until(&mut seen, deadline).timed_out() {
                    break;
                }
            }
            seen.clone()
        }
    }

    pub fn notifications() -> Arc<Notifications> {
        Arc::new(Notifications::default())
    }
}

fn software_bridge(
    hz: u32,
    sink: &Arc<Notifications>,
) -> Result<SchedulingBridge<SoftwareRtos>, Box<dyn std::error::Error>> {
    let rtos = SoftwareRtos::new(SoftwareRtosConfig::default().with_tick_rate_hz(hz))?;
    let sink = Arc::clone(sink);
    let bridge = SchedulingBridge::new(rtos, BridgeConfig::default(), move || sink.record());
    bridge.initialize()?;
    bridge.vm_task_started()?;
    Ok(bridge)
}

#[test]
fn test_superseded_deadline_notifies_once_at_earlier_time() -> TestResult {
    let sink = notifications();
    let bridge = software_bridge(1000, &sink)?;

    let started = Instant::now();
    let now = bridge.current_time(false);
    bridge.schedule_request(now + 50)?;
    bridge.schedule_request(now + 10)?;

    let seen = sink.wait_for(1, Duration::from_secs(2));
    let (at, task) = *seen.first().ok_or("timer never fired")?;
    assert!(at.duration_since(started) >= Duration::from_millis(9));
    assert_ne!(task, TaskId::current());

    // The replaced 50ms arm must not produce a second notification
    thread::sleep(Duration::from_millis(80));
    assert_eq!(sink.count(), 1);
    assert!(bridge.timer_fired());
    Ok(())
}

#[test]
fn test_coarse_tick_rate_never_wakes_early() -> TestResult {
    let sink = notifications();
    let bridge = software_bridge(100, &sink)?;

    let started = Instant::now();
    bridge.schedule_request(bridge.current_time(false) + 25)?;

    let seen = sink.wait_for(1, Duration::from_secs(2));
    let (at, _) = *seen.first().ok_or("timer never fired")?;
    assert!(at.duration_since(started) >= Duration::from_millis(24));
    Ok(())
}

#[test]
fn test_past_deadline_notifies_on_calling_thread() -> TestResult {
    let sink = notifications();
    let bridge = software_bridge(1000, &sink)?;

    bridge.schedule_request(bridge.current_time(false) - 1)?;
    let seen = sink.wait_for(1, Duration::ZERO);
    let (_, task) = *seen.first().ok_or("no synchronous notification")?;
    assert_eq!(task, TaskId::current());
    assert_eq!(bridge.next_wake_deadline(), None);
    Ok(())
}

#[test]
fn test_timer_service_wakes_idle_vm() -> TestResult {
    let rtos = SoftwareRtos::with_tick_rate_hz(1000)?;
    let slot: Arc<parking_lot::Mutex<Option<WakeHandle<vmwake_rtos::SoftwareSemaphore>>>> =
        Arc::new(parking_lot::Mutex::new(None));
    let waker = Arc::clone(&slot);
    let bridge = SchedulingBridge::new(rtos, BridgeConfig::default(), move || {
        if let Some(handle) = waker.lock().as_ref() {
            drop(handle.wakeup());
        }
    });
    bridge.initialize()?;
    *slot.lock() = Some(bridge.wake_handle()?);

    let started = Instant::now();
    bridge.schedule_request(bridge.current_time(false) + 15)?;
    bridge.idle_vm()?;
    assert!(started.elapsed() >= Duration::from_millis(14));
    Ok(())
}

#[test]
fn test_external_event_wakes_idle_vm() -> TestResult {
    let sink = notifications();
    let bridge = software_bridge(1000, &sink)?;
    let handle = bridge.wake_handle()?;

    let event = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        handle.wakeup()
    });
    bridge.idle_vm()?;
    assert!(matches!(event.join(), Ok(Ok(()))));
    assert_eq!(sink.count(), 0);
    Ok(())
}

#[test]
fn test_superseding_short_arms_while_expiries_land() -> TestResult {
    let sink = notifications();
    let bridge = software_bridge(1000, &sink)?;

    // Short arms are replaced while earlier ones are expiring on the service thread
    for round in 0..100u64 {
        let now = bridge.current_time(false);
        bridge.schedule_request(now + 3)?;
        bridge.schedule_request(now + 1)?;
        if round % 3 == 0 {
            thread::sleep(Duration::from_millis(round % 4));
        }
    }

    // Let the last short arm and any expiry already in flight settle
    thread::sleep(Duration::from_millis(10));
    let before = sink.count();

    let now = bridge.current_time(false);
    let final_deadline = now + 20;
    bridge.schedule_request(now + 40)?;
    bridge.schedule_request(final_deadline)?;
    let requested = Instant::now();
    assert_eq!(bridge.next_wake_deadline(), Some(final_deadline));

    let seen = sink.wait_for(before + 1, Duration::from_secs(2));
    let (at, _) = *seen.get(before).ok_or("final arm never notified")?;
    assert!(at.duration_since(requested) >= Duration::from_millis(18));
    assert!(bridge.timer_fired());
    assert_eq!(bridge.next_wake_deadline(), None);

    // The replaced 40ms arm stays silent
    thread::sleep(Duration::from_millis(40));
    assert_eq!(sink.count(), before + 1);

    let counters = bridge.counters();
    assert_eq!(counters.failures, 0);
    assert_eq!(counters.foreign_fires, 0);
    Ok(())
}
