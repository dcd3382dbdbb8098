/*!
 * Task Stack Provisioning
 *
 * Tasks whose stack lives in external memory. The control block always
 * comes from internal memory: the scheduler touches it on every switch.
 */

use super::super::types::{AllocError, AllocResult, AllocationRecord, PoolKind};
use super::PsramManager;
use crate::core::limits::{CONTROL_BLOCK_SIZE, STACK_ALIGNMENT, STACK_WORD_ROUNDING, STACK_WORD_SIZE};
use crate::core::types::{Address, Capability, CoreAffinity, Priority, Size};
use crate::platform::{StaticBuffers, TaskHandle, TaskSpec};
use log::{error, info, warn};

/// A created task and the two buffers bound to it
///
/// Neither buffer is reclaimed when the task ends; the control block stays
/// in the ledger for attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGrant {
    pub handle: TaskHandle,
    /// Aligned stack handle in external memory
    pub stack: Address,
    pub stack_bytes: Size,
    /// Control block in internal memory
    pub control_block: Address,
}

impl PsramManager {
    /// Create a task with an external-memory stack
    ///
    /// `stack_words` is rounded up to a multiple of four words. If the
    /// control block cannot be obtained, or the scheduler refuses the task,
    /// everything already obtained is released before returning.
    pub fn create_task_with_external_stack<F>(
        &self,
        entry: F,
        name: &str,
        stack_words: usize,
        priority: Priority,
        affinity: CoreAffinity,
    ) -> AllocResult<TaskGrant>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_initialized()?;
        if name.is_empty() {
            error!("Task creation rejected: empty name");
            return Err(AllocError::InvalidTaskName);
        }

        let words = stack_words
            .checked_next_multiple_of(STACK_WORD_ROUNDING)
            .ok_or(AllocError::SizeOverflow)?;
        let stack_bytes = words
            .checked_mul(STACK_WORD_SIZE)
            .ok_or(AllocError::SizeOverflow)?;

        let stack = self
            .allocate_aligned_attributed(
                stack_bytes,
                STACK_ALIGNMENT,
                PoolKind::TaskStacks,
                &format!("{} - stack", name),
                self.current_owner(),
            )
            .map_err(|e| {
                warn!("No external stack for task {} ({} bytes): {}", name, stack_bytes, e);
                e
            })?;

        let Some(control_block) = self.heap.malloc(CONTROL_BLOCK_SIZE, Capability::Internal) else {
            error!("No internal control block for task {}", name);
            self.release_stack(stack, name);
            return Err(AllocError::ControlBlockUnavailable);
        };

        info!(
            "Creating task {}: stack {} bytes external, control block {} bytes internal",
            name, stack_bytes, CONTROL_BLOCK_SIZE
        );

        let spec = TaskSpec::new(name, Box::new(entry))
            .with_stack_words(words)
            .with_priority(priority)
            .with_affinity(affinity);
        let buffers = StaticBuffers {
            stack,
            stack_bytes,
            control_block,
        };

        let handle = match self.scheduler.create_static(spec, buffers) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Scheduler refused task {}: {}", name, e);
                self.release_stack(stack, name);
                self.heap.free(control_block);
                return Err(AllocError::TaskCreation(e));
            }
        };

        let record = AllocationRecord::new(
            control_block,
            CONTROL_BLOCK_SIZE,
            self.current_owner(),
            format!("{} - TCB(internal)", name),
            self.now_ms(),
            Capability::Internal,
        );
        match self.lock() {
            Ok(mut state) => state.track_allocation(record),
            // The task is already running; only attribution is lost
            Err(e) => warn!("Control block of task {} not recorded: {}", name, e),
        }

        info!("Task {} created with external stack at 0x{:x}", name, stack);

        Ok(TaskGrant {
            handle,
            stack,
            stack_bytes,
            control_block,
        })
    }

    fn release_stack(&self, stack: Address, name: &str) {
        if let Err(e) = self.deallocate(stack) {
            error!("Stack of task {} could not be released: {}", name, e);
        }
    }
}
