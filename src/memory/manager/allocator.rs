/*!
 * Allocation API
 * Allocation, aligned allocation and deallocation over the capability heap
 */

use super::super::types::{AllocError, AllocResult, AllocationRecord, MemoryPressure, PoolKind};
use super::PsramManager;
use crate::core::limits::{ALIGNED_PURPOSE, GRAPHICS_ALIGNMENT, HEAP_GRANULARITY};
use crate::core::types::{align_up, Address, Capability, Size};
use log::{error, info, warn};

impl PsramManager {
    /// Allocate `size` bytes of external memory attributed to the calling task
    pub fn allocate(&self, size: Size, purpose: &str, pool: PoolKind) -> AllocResult<Address> {
        let owner = self.current_owner();
        self.allocate_attributed(size, purpose, pool, owner)
    }

    /// Allocate with an explicit owner
    pub(super) fn allocate_attributed(
        &self,
        size: Size,
        purpose: &str,
        pool: PoolKind,
        owner: String,
    ) -> AllocResult<Address> {
        self.ensure_initialized()?;
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let full_purpose = format!("{} - {}", pool.name(), purpose);
        self.allocate_locked(size, 1, full_purpose, owner)
    }

    /// Allocate `size` bytes whose handle is a multiple of `alignment`
    ///
    /// The handle may differ from the address the heap returned; it is the
    /// only value `deallocate` accepts.
    pub fn allocate_aligned(
        &self,
        size: Size,
        alignment: Size,
        pool: PoolKind,
    ) -> AllocResult<Address> {
        let owner = self.current_owner();
        self.allocate_aligned_attributed(size, alignment, pool, ALIGNED_PURPOSE, owner)
    }

    pub(super) fn allocate_aligned_attributed(
        &self,
        size: Size,
        alignment: Size,
        pool: PoolKind,
        purpose: &str,
        owner: String,
    ) -> AllocResult<Address> {
        self.ensure_initialized()?;
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        if !alignment.is_power_of_two() {
            return Err(AllocError::InvalidAlignment(alignment));
        }

        // Round up to the boundary, then pad so an aligned address always
        // fits inside the block the heap hands back.
        let padding = alignment.saturating_sub(HEAP_GRANULARITY);
        let request = size
            .checked_next_multiple_of(alignment)
            .and_then(|rounded| rounded.checked_add(padding))
            .ok_or(AllocError::SizeOverflow)?;

        let full_purpose = format!("{} - {}", pool.name(), purpose);
        self.allocate_locked(request, alignment, full_purpose, owner)
    }

    /// Carve, align and record under a single lock acquisition
    fn allocate_locked(
        &self,
        size: Size,
        alignment: Size,
        purpose: String,
        owner: String,
    ) -> AllocResult<Address> {
        let mut state = self.lock()?;

        let Some(base) = self.heap.malloc(size, Capability::External) else {
            warn!(
                "External allocation of {} bytes failed ({}, owner {})",
                size, purpose, owner
            );
            return Err(AllocError::OutOfMemory {
                requested: size,
                capability: Capability::External,
            });
        };

        let address = align_up(base, alignment);

        let mut record = AllocationRecord::new(
            address,
            size,
            owner,
            purpose,
            self.now_ms(),
            Capability::External,
        );
        record.base = base;

        if self.debug_enabled() {
            info!(
                "Allocated {} bytes at 0x{:x} for {} ({})",
                size, address, record.owner, record.purpose
            );
        }

        state.track_allocation(record);

        let pressure = state.stats.pressure();
        if pressure >= MemoryPressure::High {
            warn!(
                "Memory pressure {}: {:.1}% used ({} / {})",
                pressure,
                state.stats.usage_percent(),
                state.stats.used_size,
                state.stats.total_size
            );
        }

        Ok(address)
    }

    /// Release a handle returned by one of the allocation calls
    pub fn deallocate(&self, address: Address) -> AllocResult<()> {
        if address == 0 {
            return Err(AllocError::InvalidHandle(address));
        }
        self.ensure_initialized()?;

        let mut state = self.lock()?;
        let record = state
            .ledger
            .remove(address)
            .ok_or(AllocError::InvalidHandle(address))?;

        if !self.heap.free(record.base_address()) {
            error!(
                "Heap rejected block 0x{:x} (base 0x{:x}) owned by {}",
                address,
                record.base_address(),
                record.owner
            );
        }
        state.track_release(&record);

        if self.debug_enabled() {
            info!("Freed {} bytes at 0x{:x} ({})", record.size, address, record.purpose);
        }

        Ok(())
    }

    /// Release every block owned by `owner`
    ///
    /// Handles are collected under the lock and released one by one after
    /// it is dropped. Every handle is attempted even if some fail.
    pub fn deallocate_all(&self, owner: &str) -> AllocResult<usize> {
        self.ensure_initialized()?;
        if owner.is_empty() {
            return Err(AllocError::InvalidTaskName);
        }

        let addresses = self.lock()?.ledger.owned_by(owner);
        let attempted = addresses.len();

        let released = addresses
            .into_iter()
            .filter(|&address| match self.deallocate(address) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to release 0x{:x} for {}: {}", address, owner, e);
                    false
                }
            })
            .count();

        info!("Released {} of {} blocks owned by {}", released, attempted, owner);

        if released == attempted {
            Ok(released)
        } else {
            Err(AllocError::PartialRelease {
                released,
                attempted,
            })
        }
    }

    /// General-pool allocation attributed to `task_name`
    pub fn allocate_for_task(
        &self,
        size: Size,
        task_name: &str,
        purpose: &str,
    ) -> AllocResult<Address> {
        if task_name.is_empty() {
            return Err(AllocError::InvalidTaskName);
        }
        let purpose = format!("{} - {}", task_name, purpose);
        self.allocate_attributed(size, &purpose, PoolKind::General, task_name.to_string())
    }

    /// 32-byte aligned graphics surface of `width` x `height` pixels
    pub fn allocate_graphics_buffer(
        &self,
        width: usize,
        height: usize,
        bytes_per_pixel: usize,
    ) -> AllocResult<Address> {
        let size = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
            .ok_or(AllocError::SizeOverflow)?;
        let purpose = format!("graphics buffer {}x{}x{}", width, height, bytes_per_pixel);

        self.allocate_aligned_attributed(
            size,
            GRAPHICS_ALIGNMENT,
            PoolKind::Graphics,
            &purpose,
            self.current_owner(),
        )
    }

    /// Buffer-pool allocation for data sets (audio, JSON, network)
    pub fn allocate_data_buffer(&self, size: Size, purpose: &str) -> AllocResult<Address> {
        self.allocate(size, &format!("data buffer - {}", purpose), PoolKind::Buffers)
    }
}
