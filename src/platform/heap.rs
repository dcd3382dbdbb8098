/*!
 * Simulated Capability Heap
 *
 * Host stand-in for the platform's capability-tagged allocator. Each
 * capability owns one contiguous region carved with a best-fit free list.
 * Blocks are rounded up to the heap granularity, like the on-target heap.
 */

use super::free_list::{FreeBlock, FreeList};
use super::{CapabilityHeap, HeapStats};
use crate::core::limits::{
    DEFAULT_EXTERNAL_SIZE, DEFAULT_INTERNAL_SIZE, EXTERNAL_REGION_BASE, HEAP_GRANULARITY,
    INTERNAL_REGION_BASE,
};
use crate::core::types::{Address, Capability, Size};
use ahash::HashMap;
use log::{debug, error};
use parking_lot::Mutex;

#[derive(Debug)]
struct Region {
    base: Address,
    size: Size,
    free: FreeList,
    allocated: HashMap<Address, Size>,
    minimum_ever_free: Size,
    successful_allocations: usize,
    successful_frees: usize,
}

impl Region {
    fn new(base: Address, size: Size) -> Self {
        let mut free = FreeList::new();
        free.insert(FreeBlock {
            address: base,
            size,
        });
        Self {
            base,
            size,
            free,
            allocated: HashMap::default(),
            minimum_ever_free: size,
            successful_allocations: 0,
            successful_frees: 0,
        }
    }

    fn contains(&self, address: Address) -> bool {
        address >= self.base && address < self.base + self.size
    }

    fn stats(&self) -> HeapStats {
        HeapStats {
            total_bytes: self.size,
            free_bytes: self.free.total(),
            largest_free_block: self.free.largest(),
            free_blocks: self.free.len(),
            minimum_ever_free: self.minimum_ever_free,
            successful_allocations: self.successful_allocations,
            successful_frees: self.successful_frees,
        }
    }

    fn validate(&self) -> bool {
        let allocated: Size = self.allocated.values().sum();
        if allocated + self.free.total() != self.size {
            error!(
                "Region 0x{:x}: {} allocated + {} free != {} total",
                self.base,
                allocated,
                self.free.total(),
                self.size
            );
            return false;
        }

        for block in self.free.iter() {
            if block.address < self.base || block.address + block.size > self.base + self.size {
                error!("Region 0x{:x}: free block 0x{:x} out of bounds", self.base, block.address);
                return false;
            }
        }

        for (&address, &size) in &self.allocated {
            if !self.contains(address) || self.free.overlaps(address, size) {
                error!("Region 0x{:x}: live block 0x{:x} overlaps free space", self.base, address);
                return false;
            }
        }

        true
    }
}

/// Two-region heap: external (PSRAM) and internal (SRAM)
#[derive(Debug)]
pub struct SimulatedHeap {
    external: Mutex<Region>,
    internal: Mutex<Region>,
}

impl SimulatedHeap {
    /// Heap with the default 8MB external and 320KB internal regions
    pub fn new() -> Self {
        Self::with_sizes(DEFAULT_EXTERNAL_SIZE, DEFAULT_INTERNAL_SIZE)
    }

    /// Heap with custom region sizes (useful for testing exhaustion)
    ///
    /// An external size of 0 models a board without PSRAM.
    pub fn with_sizes(external: Size, internal: Size) -> Self {
        Self {
            external: Mutex::new(Region::new(EXTERNAL_REGION_BASE, external)),
            internal: Mutex::new(Region::new(INTERNAL_REGION_BASE, internal)),
        }
    }

    fn region(&self, capability: Capability) -> &Mutex<Region> {
        match capability {
            Capability::External => &self.external,
            Capability::Internal => &self.internal,
        }
    }
}

impl Default for SimulatedHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityHeap for SimulatedHeap {
    fn malloc(&self, size: Size, capability: Capability) -> Option<Address> {
        if size == 0 {
            return None;
        }
        let size = size.checked_next_multiple_of(HEAP_GRANULARITY)?;

        let mut region = self.region(capability).lock();
        let address = region.free.take_best_fit(size)?;
        region.allocated.insert(address, size);
        region.successful_allocations += 1;
        let free_now = region.free.total();
        if free_now < region.minimum_ever_free {
            region.minimum_ever_free = free_now;
        }

        debug!("heap[{}]: malloc {} bytes at 0x{:x}", capability, size, address);
        Some(address)
    }

    fn free(&self, address: Address) -> bool {
        for capability in [Capability::External, Capability::Internal] {
            let mut region = self.region(capability).lock();
            if !region.contains(address) {
                continue;
            }
            return match region.allocated.remove(&address) {
                Some(size) => {
                    region.free.insert(FreeBlock { address, size });
                    region.successful_frees += 1;
                    debug!("heap[{}]: free {} bytes at 0x{:x}", capability, size, address);
                    true
                }
                None => {
                    error!("heap[{}]: free of unknown block 0x{:x}", capability, address);
                    false
                }
            };
        }
        error!("heap: free of address 0x{:x} outside every region", address);
        false
    }

    fn stats(&self, capability: Capability) -> HeapStats {
        self.region(capability).lock().stats()
    }

    fn check_integrity(&self) -> bool {
        self.external.lock().validate() && self.internal.lock().validate()
    }
}
