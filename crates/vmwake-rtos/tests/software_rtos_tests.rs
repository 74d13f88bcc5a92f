//! Integration tests for the threaded software RTOS.

use crossbeam::channel::{Receiver, bounded};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vmwake_rtos::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn channel_callback() -> (TimerCallback, Receiver<(TimerFire, TaskId)>) {
    let (tx, rx) = bounded(16);
    let callback: TimerCallback = Arc::new(move |fire| {
        let _unreceived = tx.try_send((fire, TaskId::current()));
    });
    (callback, rx)
}

#[test]
fn test_callback_runs_in_timer_service_context() -> TestResult {
    let rtos = SoftwareRtos::new(SoftwareRtosConfig::default().with_service_thread_name("svc"))?;
    let (callback, rx) = channel_callback();
    let timer = rtos.create_timer("wake", 1, callback)?;

    timer.arm(1)?;
    let (_, task) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_ne!(task, rtos.current_task_id());
    Ok(())
}

#[test]
fn test_expiry_respects_requested_delay() -> TestResult {
    let rtos = SoftwareRtos::with_tick_rate_hz(100)?;
    let (callback, rx) = channel_callback();
    let timer = rtos.create_timer("wake", 1, callback)?;

    let started = Instant::now();
    let ticks = rtos.timer_tick_rate().ms_to_ticks_ceil(25);
    assert_eq!(ticks, 3);
    timer.arm(ticks)?;
    rx.recv_timeout(Duration::from_secs(2))?;
    assert!(started.elapsed() >= Duration::from_millis(25));
    Ok(())
}

#[test]
fn test_earlier_timer_fires_first() -> TestResult {
    let rtos = SoftwareRtos::with_tick_rate_hz(1000)?;
    let (late_cb, late_rx) = channel_callback();
    let (early_cb, early_rx) = channel_callback();
    let late = rtos.create_timer("late", 1, late_cb)?;
    let early = rtos.create_timer("early", 1, early_cb)?;

    late.arm(60)?;
    early.arm(5)?;
    let (fire, _) = early_rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(fire.timer, early.id());
    assert_eq!(late.state(), TimerState::Armed);
    late_rx.recv_timeout(Duration::from_secs(2))?;
    Ok(())
}

#[test]
fn test_semaphore_wakes_blocked_thread() -> TestResult {
    let rtos = SoftwareRtos::with_tick_rate_hz(1000)?;
    let semaphore = Arc::new(rtos.create_semaphore("wake", 0)?);

    let waiter = {
        let semaphore = Arc::clone(&semaphore);
        thread::spawn(move || semaphore.pend())
    };
    while semaphore.waiters() == 0 {
        thread::yield_now();
    }
    semaphore.post_all()?;

    assert!(matches!(waiter.join(), Ok(Ok(()))));
    Ok(())
}

#[test]
fn test_timer_callback_can_post_semaphore() -> TestResult {
    let rtos = SoftwareRtos::with_tick_rate_hz(1000)?;
    let semaphore = Arc::new(rtos.create_semaphore("wake", 0)?);
    let poster = Arc::clone(&semaphore);
    let timer = rtos.create_timer(
        "wake",
        1,
        Arc::new(move |_| {
            drop(poster.post_all());
        }),
    )?;

    timer.arm(3)?;
    assert!(semaphore.pend_timeout(Duration::from_secs(2)));
    Ok(())
}
