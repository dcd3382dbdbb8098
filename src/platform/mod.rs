/*!
 * Platform Primitives
 *
 * The two collaborators the allocator sits on top of:
 *
 * - **CapabilityHeap**: carves raw bytes out of a tagged memory region and
 *   reports per-region introspection. The allocator never manages a free
 *   list itself.
 * - **TaskScheduler**: creates scheduled execution units, either with
 *   scheduler-owned memory or with caller-provided stack and control block.
 *
 * Host implementations (`SimulatedHeap`, `ThreadScheduler`) make the crate
 * runnable off-target.
 */

mod free_list;
mod heap;
mod scheduler;

pub use heap::SimulatedHeap;
pub use scheduler::ThreadScheduler;

use crate::core::types::{Address, Capability, CoreAffinity, Priority, Size, TaskId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Region introspection, one snapshot per capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    pub total_bytes: Size,
    pub free_bytes: Size,
    pub largest_free_block: Size,
    pub free_blocks: usize,
    pub minimum_ever_free: Size,
    pub successful_allocations: usize,
    pub successful_frees: usize,
}

/// Capability-aware raw allocator
pub trait CapabilityHeap: Send + Sync {
    /// Allocate `size` bytes tagged with `capability`; None when exhausted
    fn malloc(&self, size: Size, capability: Capability) -> Option<Address>;

    /// Return a block obtained from `malloc`; false if the address is unknown
    fn free(&self, address: Address) -> bool;

    /// Introspection for one capability
    fn stats(&self, capability: Capability) -> HeapStats;

    /// Walk every region and verify its bookkeeping
    fn check_integrity(&self) -> bool;

    /// Whether the capability is backed by memory at all
    fn is_present(&self, capability: Capability) -> bool {
        self.stats(capability).total_bytes > 0
    }
}

/// Body of a scheduled execution unit
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// Everything the scheduler needs to create one task
pub struct TaskSpec {
    pub name: String,
    pub entry: TaskEntry,
    pub stack_words: usize,
    pub priority: Priority,
    pub affinity: CoreAffinity,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, entry: TaskEntry) -> Self {
        Self {
            name: name.into(),
            entry,
            stack_words: crate::core::limits::MONITOR_STACK_WORDS,
            priority: 1,
            affinity: CoreAffinity::Any,
        }
    }

    pub fn with_stack_words(mut self, words: usize) -> Self {
        self.stack_words = words;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_affinity(mut self, affinity: CoreAffinity) -> Self {
        self.affinity = affinity;
        self
    }
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("stack_words", &self.stack_words)
            .field("priority", &self.priority)
            .field("affinity", &self.affinity)
            .finish_non_exhaustive()
    }
}

/// Memory handed to the static-creation primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticBuffers {
    /// Stack buffer in external memory
    pub stack: Address,
    pub stack_bytes: Size,
    /// Control block in internal memory
    pub control_block: Address,
}

/// Handle to a created task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: TaskId,
    pub name: String,
}

/// Scheduler failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Task {0:?} could not be spawned: {1}")]
    SpawnFailed(String, String),

    #[error("Invalid task parameters: {0}")]
    InvalidParameters(String),
}

/// Real-time scheduler seam
pub trait TaskScheduler: Send + Sync {
    /// Create a task whose stack and control block the scheduler owns
    fn spawn(&self, spec: TaskSpec) -> Result<TaskHandle, SchedulerError>;

    /// Create a task bound to caller-provided stack and control block
    fn create_static(
        &self,
        spec: TaskSpec,
        buffers: StaticBuffers,
    ) -> Result<TaskHandle, SchedulerError>;

    /// Remove a task from the scheduler; it never runs again
    fn delete(&self, handle: &TaskHandle);

    /// Name of the calling task, if it is a named scheduled unit
    fn current_task_name(&self) -> Option<String>;
}
