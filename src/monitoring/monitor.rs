/*!
 * Background Monitor
 *
 * Low-priority scheduled unit that garbage-collects the ledger, refreshes
 * statistics and hands a snapshot to the registered callback once per
 * period. Stopping never drains: the loop notices at its next wake.
 */

use super::tracer::monitor_cycle_span;
use crate::core::limits::{MONITOR_CORE, MONITOR_PRIORITY, MONITOR_STACK_WORDS, MONITOR_TASK_NAME};
use crate::core::types::CoreAffinity;
use crate::memory::manager::PsramManager;
use crate::platform::{SchedulerError, TaskHandle, TaskScheduler, TaskSpec};
use flume::{Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Handle to the running monitor
#[derive(Debug)]
pub struct MonitorTask {
    handle: TaskHandle,
    stop_tx: Sender<()>,
    running: Arc<AtomicBool>,
}

impl MonitorTask {
    /// Spawn the monitor loop on the manager's scheduler
    pub fn spawn(
        scheduler: &dyn TaskScheduler,
        manager: PsramManager,
        period: Duration,
    ) -> Result<Self, SchedulerError> {
        let (stop_tx, stop_rx) = flume::bounded(1);
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let spec = TaskSpec::new(
            MONITOR_TASK_NAME,
            Box::new(move || run_monitor_loop(manager, period, stop_rx, flag)),
        )
        .with_stack_words(MONITOR_STACK_WORDS)
        .with_priority(MONITOR_PRIORITY)
        .with_affinity(CoreAffinity::Pinned(MONITOR_CORE));

        let handle = scheduler.spawn(spec).map_err(|e| {
            warn!("Monitor task could not be started: {}", e);
            e
        })?;

        info!("Monitor task started, period {:?}", period);
        Ok(Self {
            handle,
            stop_tx,
            running,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the running flag, wake the loop and delete the task
    pub fn stop(self, scheduler: &dyn TaskScheduler) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.try_send(());
        scheduler.delete(&self.handle);
        info!("Monitor task stopped");
    }
}

fn run_monitor_loop(
    manager: PsramManager,
    period: Duration,
    stop_rx: Receiver<()>,
    running: Arc<AtomicBool>,
) {
    info!("Monitor loop running");
    let mut cycle = 0u64;

    while running.load(Ordering::SeqCst) {
        {
            let span = monitor_cycle_span(cycle);
            let _entered = span.enter();
            if let Err(e) = manager.monitor_cycle() {
                warn!("Monitor cycle {} skipped: {}", cycle, e);
            }
        }
        cycle += 1;

        match stop_rx.recv_timeout(period) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    running.store(false, Ordering::SeqCst);
    info!("Monitor loop exited after {} cycles", cycle);
}
