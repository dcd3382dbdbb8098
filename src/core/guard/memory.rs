/*!
 * Block Guards
 *
 * RAII ownership of one external memory block
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use crate::core::types::{Address, Size};
use crate::memory::manager::PsramManager;
use log::{debug, error};

/// Scoped external memory block, deallocated on drop
pub struct BlockGuard {
    address: Address,
    size: Size,
    manager: PsramManager,
    metadata: GuardMetadata,
    active: bool,
}

impl BlockGuard {
    /// Take ownership of a live handle
    #[inline]
    pub fn new(address: Address, size: Size, owner: String, manager: PsramManager) -> Self {
        let metadata = GuardMetadata::new("external_block")
            .with_owner(owner)
            .with_size(size);

        Self {
            address,
            size,
            manager,
            metadata,
            active: true,
        }
    }

    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Release now instead of waiting for Drop
    pub fn release_early(mut self) -> GuardResult<()> {
        self.release()
    }

    /// Give up ownership; the handle must then be deallocated manually
    pub fn into_raw(mut self) -> Address {
        self.active = false;
        self.address
    }
}

impl Guard for BlockGuard {
    fn resource_type(&self) -> &'static str {
        "external_block"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }

        self.active = false;
        self.manager
            .deallocate(self.address)
            .map_err(|e| GuardError::OperationFailed(e.to_string()))?;

        debug!(
            "Block guard released 0x{:x} after {}us",
            self.address,
            self.metadata.lifetime_micros()
        );
        Ok(())
    }
}

impl GuardDrop for BlockGuard {
    fn on_drop(&mut self) {
        if self.active {
            if let Err(e) = self.release() {
                error!(
                    "Block guard drop failed for 0x{:x} ({:?}): {}",
                    self.address, self.metadata.owner, e
                );
            }
        }
    }
}

impl Drop for BlockGuard {
    #[inline]
    fn drop(&mut self) {
        self.on_drop();
    }
}

impl std::fmt::Debug for BlockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BlockGuard")
            .field("address", &format_args!("0x{:x}", self.address))
            .field("size", &self.size)
            .field("active", &self.active)
            .finish()
    }
}
