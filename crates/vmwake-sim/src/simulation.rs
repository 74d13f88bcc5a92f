//! A toy cooperative VM driving the bridge on the software RTOS.
//!
//! The VM keeps a queue of sleeping green threads. Each cycle it resumes every
//! thread whose deadline has passed, asks the bridge to wake it at the next
//! deadline, and idles. Wakes come from the bridge's timer notification or from
//! an optional external event thread.

use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use vmwake_bridge::{CounterSnapshot, SchedulingBridge, WakeHandle};
use vmwake_rtos::{SoftwareRtos, SoftwareRtosConfig, SoftwareSemaphore};

use crate::config::SimConfig;
use crate::error::SimError;

/// Outcome of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub tick_rate_hz: u32,
    pub threads_resumed: u64,
    pub idle_cycles: u64,
    pub max_lateness_ms: i64,
    pub early_resumes: u64,
    pub external_wakes_sent: u32,
    pub elapsed_ms: i64,
    pub counters: CounterSnapshot,
}

type Handle = WakeHandle<SoftwareSemaphore>;

/// Run the simulation described by `config`.
pub fn run(config: &SimConfig) -> Result<SimReport, SimError> {
    config.validate()?;

    let rtos = SoftwareRtos::new(
        SoftwareRtosConfig::default()
            .with_tick_rate_hz(config.tick_rate_hz)
            .with_service_thread_name("vmwake-timer"),
    )?;

    let slot: Arc<OnceLock<Handle>> = Arc::new(OnceLock::new());
    let notifier_slot = Arc::clone(&slot);
    let bridge = SchedulingBridge::new(rtos, config.bridge.clone(), move || {
        if let Some(handle) = notifier_slot.get()
            && let Err(e) = handle.wakeup()
        {
            warn!(error = %e, "scheduler notification could not release the VM task");
        }
    });
    bridge.initialize()?;

    let handle = bridge.wake_handle()?;
    drop(slot.set(handle.clone()));
    let events = spawn_external_events(config, handle)?;

    bridge.vm_task_started()?;
    info!(task = %bridge.current_task_id(), threads = config.delays_ms.len(), "VM task running");

    let start = bridge.current_time(false);
    let mut queue: BinaryHeap<Reverse<i64>> = config
        .delays_ms
        .iter()
        .map(|delay| Reverse(start.saturating_add(*delay)))
        .collect();

    let mut threads_resumed = 0u64;
    let mut idle_cycles = 0u64;
    let mut max_lateness_ms = 0i64;
    let mut early_resumes = 0u64;

    while let Some(&Reverse(next)) = queue.peek() {
        let now = bridge.current_time(false);
        if next <= now {
            queue.pop();
            let lateness = now.saturating_sub(next);
            max_lateness_ms = max_lateness_ms.max(lateness);
            threads_resumed = threads_resumed.saturating_add(1);
            debug!(deadline = next, now, lateness_ms = lateness, "green thread resumed");
            continue;
        }

        bridge.schedule_request(next)?;
        bridge.idle_vm()?;
        bridge.ack_wakeup()?;
        idle_cycles = idle_cycles.saturating_add(1);

        if bridge.current_time(false) < next {
            early_resumes = early_resumes.saturating_add(1);
            debug!(deadline = next, "woken before deadline");
        }
    }

    let elapsed_ms = bridge.current_time(false).saturating_sub(start);
    let external_wakes_sent = match events.map(JoinHandle::join) {
        Some(Ok(sent)) => sent,
        Some(Err(panic)) => {
            warn!(?panic, "external event thread panicked");
            return Err(SimError::EventThreadPanicked);
        }
        None => 0,
    };
    bridge.shutdown()?;

    let report = SimReport {
        tick_rate_hz: config.tick_rate_hz,
        threads_resumed,
        idle_cycles,
        max_lateness_ms,
        early_resumes,
        external_wakes_sent,
        elapsed_ms,
        counters: bridge.counters(),
    };
    info!(
        threads = report.threads_resumed,
        idle_cycles = report.idle_cycles,
        max_lateness_ms = report.max_lateness_ms,
        "simulation finished"
    );
    Ok(report)
}

fn spawn_external_events(
    config: &SimConfig,
    handle: Handle,
) -> Result<Option<JoinHandle<u32>>, SimError> {
    let Some(interval_ms) = config.external_wake_interval_ms else {
        return Ok(None);
    };
    let count = config.external_wakes;
    let interval = Duration::from_millis(interval_ms);

    let events = thread::Builder::new()
        .name("external-events".to_string())
        .spawn(move || {
            let mut sent = 0u32;
            for _ in 0..count {
                thread::sleep(interval);
                match handle.wakeup() {
                    Ok(()) => sent = sent.saturating_add(1),
                    Err(e) => warn!(error = %e, "external wake failed"),
                }
            }
            sent
        })?;
    Ok(Some(events))
}
