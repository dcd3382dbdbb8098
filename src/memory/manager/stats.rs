/*!
 * Statistics and Introspection
 */

use super::super::types::{AllocResult, AllocationRecord, AllocatorStatistics, OwnerMemoryStats};
use super::PsramManager;
use crate::core::types::{Address, Capability, Size};
use std::sync::atomic::Ordering;

impl PsramManager {
    /// Fresh statistics snapshot
    ///
    /// Sizes and fragmentation come from the heap; counters from the ledger.
    pub fn statistics(&self) -> AllocResult<AllocatorStatistics> {
        let mut state = self.lock()?;
        state.refresh(self.heap.as_ref());
        Ok(state.stats)
    }

    // The getters below read the heap directly and never take the lock

    pub fn total_size(&self) -> Size {
        self.heap.stats(Capability::External).total_bytes
    }

    pub fn used_size(&self) -> Size {
        let stats = self.heap.stats(Capability::External);
        stats.total_bytes.saturating_sub(stats.free_bytes)
    }

    pub fn free_size(&self) -> Size {
        self.heap.stats(Capability::External).free_bytes
    }

    pub fn largest_free_block(&self) -> Size {
        self.heap.stats(Capability::External).largest_free_block
    }

    /// Used share of external memory, 0..=100
    pub fn usage_percent(&self) -> f64 {
        let stats = self.heap.stats(Capability::External);
        if stats.total_bytes == 0 {
            return 0.0;
        }
        (stats.total_bytes - stats.free_bytes) as f64 / stats.total_bytes as f64 * 100.0
    }

    /// Fragmentation of the free external space, 0..=100
    pub fn fragmentation_rate(&self) -> f64 {
        let stats = self.heap.stats(Capability::External);
        AllocatorStatistics::fragmentation(stats.free_bytes, stats.largest_free_block) * 100.0
    }

    /// Copy of every live record
    pub fn allocated_blocks(&self) -> AllocResult<Vec<AllocationRecord>> {
        Ok(self.lock()?.ledger.records().to_vec())
    }

    /// Copy of the record for one handle
    pub fn block_info(&self, address: Address) -> Option<AllocationRecord> {
        if address == 0 {
            return None;
        }
        self.lock().ok()?.ledger.get(address).cloned()
    }

    pub fn block_size(&self, address: Address) -> Option<Size> {
        self.lock().ok()?.ledger.size_of(address)
    }

    /// Number of live records, read without the lock
    pub fn block_count(&self) -> usize {
        self.block_count.load(Ordering::SeqCst)
    }

    /// Current and peak usage attributed to `owner`
    pub fn owner_usage(&self, owner: &str) -> Option<OwnerMemoryStats> {
        self.lock().ok()?.owners.get(owner).copied()
    }

    pub fn owner_allocations(&self, owner: &str) -> Vec<AllocationRecord> {
        match self.lock() {
            Ok(state) => state
                .ledger
                .records()
                .iter()
                .filter(|r| r.owner == owner)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
