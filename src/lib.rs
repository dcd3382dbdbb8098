/*!
 * External Memory Manager Library
 *
 * Allocator and resource-tracking layer for a board's external (PSRAM)
 * memory: buffers for audio, network and graphics collaborators, and
 * external-memory stacks for scheduled tasks.
 */

pub mod core;
pub mod memory;
pub mod monitoring;
pub mod platform;

// Re-exports
pub use crate::core::{AllocatorConfig, BlockGuard, Capability, CoreAffinity};
pub use memory::{
    AllocError, AllocResult, AllocationRecord, Allocator, AllocatorStatistics, BlockGuardExt,
    GarbageCollector, MemoryInfo, MemoryPressure, OwnerMemoryCleanup, PoolKind, PsramManager,
    StatusReport, TaskGrant,
};
pub use platform::{CapabilityHeap, SimulatedHeap, TaskScheduler, ThreadScheduler};
