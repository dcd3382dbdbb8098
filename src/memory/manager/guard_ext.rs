/*!
 * Block Guard Extensions
 *
 * Extension trait to create RAII guards for external allocations
 */

use super::PsramManager;
use crate::core::guard::BlockGuard;
use crate::core::types::Size;
use crate::memory::types::{AllocResult, PoolKind};

/// Extension trait for creating block guards
pub trait BlockGuardExt {
    /// Allocate memory with an RAII guard for automatic cleanup
    ///
    /// # Example
    ///
    /// ```rust
    /// use psram_manager::memory::{BlockGuardExt, PoolKind, PsramManager};
    ///
    /// let manager = PsramManager::default();
    /// manager.init()?;
    /// let guard = manager.allocate_guard(1024, "scratch", PoolKind::Buffers)?;
    /// let addr = guard.address();
    /// assert!(manager.block_info(addr).is_some());
    /// // Memory automatically freed on drop
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn allocate_guard(&self, size: Size, purpose: &str, pool: PoolKind)
        -> AllocResult<BlockGuard>;
}

impl BlockGuardExt for PsramManager {
    fn allocate_guard(
        &self,
        size: Size,
        purpose: &str,
        pool: PoolKind,
    ) -> AllocResult<BlockGuard> {
        let owner = self.current_owner();
        let address = self.allocate_attributed(size, purpose, pool, owner.clone())?;
        Ok(BlockGuard::new(address, size, owner, self.clone()))
    }
}
