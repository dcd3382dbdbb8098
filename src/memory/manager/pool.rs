/*!
 * Logical Pools
 *
 * Pools are an attribution dimension. A pool can reserve a contiguous
 * external region, but the allocation path never carves from it: every
 * allocation goes straight to the capability heap.
 */

use super::super::types::{AllocError, AllocResult, PoolDescriptor, PoolKind};
use super::PsramManager;
use crate::core::types::{Capability, Size};
use log::{info, warn};

impl PsramManager {
    /// Reserve `size` bytes of external memory for `kind`
    ///
    /// A pool that is already reserved is left untouched.
    pub fn create_pool(&self, kind: PoolKind, size: Size) -> AllocResult<()> {
        self.ensure_initialized()?;
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let mut state = self.lock()?;
        if state.pool(kind).initialized {
            info!("{} already reserved", kind);
            return Ok(());
        }

        let Some(base) = self.heap.malloc(size, Capability::External) else {
            warn!("{} reservation of {} KB failed", kind, size / 1024);
            return Err(AllocError::OutOfMemory {
                requested: size,
                capability: Capability::External,
            });
        };

        *state.pool_mut(kind) = PoolDescriptor::reserved(base, size);
        info!("{} reserved: {} KB at 0x{:x}", kind, size / 1024, base);
        Ok(())
    }

    /// Release the region reserved for `kind`
    pub fn destroy_pool(&self, kind: PoolKind) -> AllocResult<()> {
        let mut state = self.lock()?;
        let descriptor = *state.pool(kind);
        if !descriptor.initialized {
            return Err(AllocError::PoolNotReserved(kind));
        }

        if let Some(base) = descriptor.base_address {
            self.heap.free(base);
        }
        *state.pool_mut(kind) = PoolDescriptor::default();
        info!("{} released", kind);
        Ok(())
    }

    /// Bytes used inside a reserved pool, 0 when unreserved
    pub fn pool_usage(&self, kind: PoolKind) -> AllocResult<Size> {
        let descriptor = self.pool_descriptor(kind)?;
        Ok(if descriptor.initialized {
            descriptor.used_size
        } else {
            0
        })
    }

    pub fn pool_descriptor(&self, kind: PoolKind) -> AllocResult<PoolDescriptor> {
        Ok(*self.lock()?.pool(kind))
    }
}
