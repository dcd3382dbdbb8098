/*!
 * Memory Traits
 *
 * The narrow contract collaborators (audio, display, network) depend on.
 * Components take one of these by reference or `Arc` at construction time
 * instead of reaching for a global allocator.
 */

use super::types::*;
use crate::core::types::{Address, Size};

/// Memory allocator interface
pub trait Allocator: Send + Sync {
    /// Allocate `size` bytes attributed to `purpose` in `pool`
    fn allocate(&self, size: Size, purpose: &str, pool: PoolKind) -> AllocResult<Address>;

    /// Allocate with the returned handle aligned to `alignment`
    fn allocate_aligned(&self, size: Size, alignment: Size, pool: PoolKind)
        -> AllocResult<Address>;

    /// Release a handle obtained from this allocator
    fn deallocate(&self, address: Address) -> AllocResult<()>;

    /// Check if an address is a live handle
    fn is_valid(&self, address: Address) -> bool {
        self.block_size(address).is_some()
    }

    /// Get the size of a live block
    fn block_size(&self, address: Address) -> Option<Size>;
}

/// Memory statistics provider
pub trait MemoryInfo: Send + Sync {
    /// Fresh statistics snapshot
    fn statistics(&self) -> AllocResult<AllocatorStatistics>;

    /// Get memory info as (total, used, free)
    fn info(&self) -> (Size, Size, Size);

    /// Get memory pressure level
    fn pressure(&self) -> MemoryPressure {
        let (total, used, _) = self.info();
        if total == 0 {
            return MemoryPressure::Low;
        }
        MemoryPressure::from_ratio(used as f64 / total as f64)
    }
}

/// Garbage collection interface
pub trait GarbageCollector: Send + Sync {
    /// Drop stale ledger records, returning how many were removed
    fn collect(&self) -> AllocResult<usize>;
}

/// Owner memory cleanup
pub trait OwnerMemoryCleanup: Send + Sync {
    /// Free all memory attributed to an owner
    fn free_owner_memory(&self, owner: &str) -> AllocResult<usize>;

    /// Get list of allocations for an owner
    fn owner_allocations(&self, owner: &str) -> Vec<AllocationRecord>;
}
