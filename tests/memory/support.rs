/*!
 * Shared test fixtures
 * Heaps and schedulers with injectable failures
 */

#![allow(dead_code)]

use psram_manager::platform::{
    HeapStats, SchedulerError, StaticBuffers, TaskHandle, TaskScheduler, TaskSpec,
};
use psram_manager::{AllocatorConfig, Capability, CapabilityHeap, PsramManager, SimulatedHeap, ThreadScheduler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Initialized manager over a simulated heap of the given sizes
pub fn manager_with(external: usize, internal: usize) -> PsramManager {
    let manager = PsramManager::with_config(
        Arc::new(SimulatedHeap::with_sizes(external, internal)),
        Arc::new(ThreadScheduler::new()),
        AllocatorConfig::default(),
    );
    manager.init().expect("init");
    manager
}

/// Simulated heap that counts internal requests and can refuse them
#[derive(Default)]
pub struct ProbeHeap {
    inner: SimulatedHeap,
    pub internal_requests: AtomicUsize,
    pub refuse_internal: AtomicBool,
}

impl ProbeHeap {
    pub fn with_sizes(external: usize, internal: usize) -> Self {
        Self {
            inner: SimulatedHeap::with_sizes(external, internal),
            internal_requests: AtomicUsize::new(0),
            refuse_internal: AtomicBool::new(false),
        }
    }

    pub fn internal_requests(&self) -> usize {
        self.internal_requests.load(Ordering::SeqCst)
    }
}

impl CapabilityHeap for ProbeHeap {
    fn malloc(&self, size: usize, capability: Capability) -> Option<usize> {
        if capability == Capability::Internal {
            self.internal_requests.fetch_add(1, Ordering::SeqCst);
            if self.refuse_internal.load(Ordering::SeqCst) {
                return None;
            }
        }
        self.inner.malloc(size, capability)
    }

    fn free(&self, address: usize) -> bool {
        self.inner.free(address)
    }

    fn stats(&self, capability: Capability) -> HeapStats {
        self.inner.stats(capability)
    }

    fn check_integrity(&self) -> bool {
        self.inner.check_integrity()
    }
}

/// Scheduler whose static creation always fails
#[derive(Default)]
pub struct RefusingScheduler {
    inner: ThreadScheduler,
    pub attempts: AtomicUsize,
}

impl TaskScheduler for RefusingScheduler {
    fn spawn(&self, spec: TaskSpec) -> Result<TaskHandle, SchedulerError> {
        self.inner.spawn(spec)
    }

    fn create_static(
        &self,
        spec: TaskSpec,
        _buffers: StaticBuffers,
    ) -> Result<TaskHandle, SchedulerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SchedulerError::SpawnFailed(spec.name, "no free task slot".into()))
    }

    fn delete(&self, handle: &TaskHandle) {
        self.inner.delete(handle)
    }

    fn current_task_name(&self) -> Option<String> {
        self.inner.current_task_name()
    }
}
