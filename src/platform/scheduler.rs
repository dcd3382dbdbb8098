/*!
 * Thread Scheduler
 *
 * Host stand-in for the real-time scheduler: every scheduled unit runs on a
 * named OS thread. Priority and core affinity are recorded but not enforced,
 * and caller-provided stacks are bookkeeping only.
 */

use super::{SchedulerError, StaticBuffers, TaskHandle, TaskScheduler, TaskSpec};
use crate::core::limits::STACK_WORD_SIZE;
use crate::core::types::{CoreAffinity, Priority, TaskId};
use ahash::RandomState;
use dashmap::DashMap;
use log::{info, warn};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Host threads need more headroom than the on-target stack request
const HOST_MIN_STACK_BYTES: usize = 256 * 1024;

thread_local! {
    static CURRENT_TASK: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Scheduler-side view of one task
#[derive(Debug)]
pub struct TaskRecord {
    pub name: String,
    pub priority: Priority,
    pub affinity: CoreAffinity,
    /// Present for statically created tasks
    pub buffers: Option<StaticBuffers>,
    join: Option<JoinHandle<()>>,
}

/// Drops a task's record when its thread exits
///
/// A panicked entry keeps its record so `join` can report the failure.
struct TaskReaper {
    tasks: Arc<DashMap<TaskId, TaskRecord, RandomState>>,
    id: TaskId,
}

impl Drop for TaskReaper {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.tasks.remove(&self.id);
        }
    }
}

/// Scheduler backed by `std::thread`
#[derive(Clone)]
pub struct ThreadScheduler {
    tasks: Arc<DashMap<TaskId, TaskRecord, RandomState>>,
    next_id: Arc<AtomicU64>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::with_hasher(RandomState::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn launch(
        &self,
        spec: TaskSpec,
        buffers: Option<StaticBuffers>,
    ) -> Result<TaskHandle, SchedulerError> {
        if spec.name.is_empty() {
            return Err(SchedulerError::InvalidParameters("empty task name".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stack_bytes = (spec.stack_words * STACK_WORD_SIZE).max(HOST_MIN_STACK_BYTES);
        let task_name = spec.name.clone();
        let entry = spec.entry;
        let reaper = TaskReaper {
            tasks: Arc::clone(&self.tasks),
            id,
        };
        // The entry waits until its record is in the table, so the reaper
        // never runs before the insert
        let (ready_tx, ready_rx) = flume::bounded::<()>(1);

        let join = std::thread::Builder::new()
            .name(spec.name.clone())
            .stack_size(stack_bytes)
            .spawn(move || {
                let _reaper = reaper;
                let _ = ready_rx.recv();
                CURRENT_TASK.with(|current| *current.borrow_mut() = Some(task_name));
                entry();
            })
            .map_err(|e| SchedulerError::SpawnFailed(spec.name.clone(), e.to_string()))?;

        info!(
            "Task {} (id {}) started: priority {}, affinity {}, {}",
            spec.name,
            id,
            spec.priority,
            spec.affinity,
            if buffers.is_some() { "static buffers" } else { "scheduler-owned buffers" }
        );

        self.tasks.insert(
            id,
            TaskRecord {
                name: spec.name.clone(),
                priority: spec.priority,
                affinity: spec.affinity,
                buffers,
                join: Some(join),
            },
        );
        let _ = ready_tx.send(());

        Ok(TaskHandle { id, name: spec.name })
    }

    /// Wait for a task to end and drop it from the table
    ///
    /// A task that already returned has removed itself, which counts as
    /// ended. Returns false for a panicked entry or a handle this scheduler
    /// never issued.
    pub fn join(&self, handle: &TaskHandle) -> bool {
        match self.tasks.remove(&handle.id) {
            Some((_, mut record)) => record.join.take().is_some_and(|join| join.join().is_ok()),
            None => handle.id > 0 && handle.id < self.next_id.load(Ordering::SeqCst),
        }
    }

    /// Buffers a static task was created with
    pub fn static_buffers(&self, handle: &TaskHandle) -> Option<StaticBuffers> {
        self.tasks.get(&handle.id).and_then(|record| record.buffers)
    }

    /// Number of tasks still known to the scheduler
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler for ThreadScheduler {
    fn spawn(&self, spec: TaskSpec) -> Result<TaskHandle, SchedulerError> {
        self.launch(spec, None)
    }

    fn create_static(
        &self,
        spec: TaskSpec,
        buffers: StaticBuffers,
    ) -> Result<TaskHandle, SchedulerError> {
        if buffers.stack == 0 || buffers.control_block == 0 {
            return Err(SchedulerError::InvalidParameters(
                "null stack or control block".into(),
            ));
        }
        self.launch(spec, Some(buffers))
    }

    fn delete(&self, handle: &TaskHandle) {
        // OS threads cannot be killed; the thread is detached and its
        // entry is expected to observe its own stop signal.
        match self.tasks.remove(&handle.id) {
            Some((_, record)) => info!("Task {} (id {}) deleted", record.name, handle.id),
            None => warn!("Delete of unknown task {} (id {})", handle.name, handle.id),
        }
    }

    fn current_task_name(&self) -> Option<String> {
        CURRENT_TASK.with(|current| current.borrow().clone())
    }
}
