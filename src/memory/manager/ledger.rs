/*!
 * Block Ledger
 *
 * Ordered allocation records plus an address→size fast lookup. Both live
 * behind the manager's single mutex together with the pool table and the
 * running statistics.
 */

use super::super::types::{
    AllocationRecord, AllocatorStatistics, OwnerMemoryStats, PoolDescriptor, PoolKind,
};
use crate::core::types::{Address, Capability, Size};
use crate::platform::CapabilityHeap;
use ahash::HashMap;
use log::error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Live allocation records
#[derive(Debug)]
pub(crate) struct Ledger {
    records: Vec<AllocationRecord>,
    sizes: HashMap<Address, Size>,
    /// Mirrors `records.len()` for lock-free reads
    live: Arc<AtomicUsize>,
}

impl Ledger {
    pub fn new(live: Arc<AtomicUsize>) -> Self {
        live.store(0, Ordering::SeqCst);
        Self {
            records: Vec::new(),
            sizes: HashMap::default(),
            live,
        }
    }

    fn publish(&self) {
        self.live.store(self.records.len(), Ordering::SeqCst);
    }

    pub fn insert(&mut self, record: AllocationRecord) {
        self.sizes.insert(record.address, record.size);
        self.records.push(record);
        self.publish();
    }

    pub fn remove(&mut self, address: Address) -> Option<AllocationRecord> {
        let in_lookup = self.sizes.remove(&address).is_some();
        let position = self.records.iter().position(|r| r.address == address);

        let record = match (position, in_lookup) {
            (Some(idx), _) => Some(self.records.remove(idx)),
            (None, true) => {
                error!("Ledger lookup held 0x{:x} without a record", address);
                None
            }
            (None, false) => None,
        };
        self.publish();
        record
    }

    pub fn get(&self, address: Address) -> Option<&AllocationRecord> {
        if !self.sizes.contains_key(&address) {
            return None;
        }
        self.records.iter().find(|r| r.address == address)
    }

    pub fn size_of(&self, address: Address) -> Option<Size> {
        self.sizes.get(&address).copied()
    }

    pub fn owned_by(&self, owner: &str) -> Vec<Address> {
        self.records
            .iter()
            .filter(|r| r.owner == owner)
            .map(|r| r.address)
            .collect()
    }

    /// Keep records matching `keep`, returning the dropped ones
    pub fn retain(&mut self, mut keep: impl FnMut(&AllocationRecord) -> bool) -> Vec<AllocationRecord> {
        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(self.records.len());
        for record in self.records.drain(..) {
            if keep(&record) {
                kept.push(record);
            } else {
                dropped.push(record);
            }
        }
        self.records = kept;
        for record in &dropped {
            self.sizes.remove(&record.address);
        }
        self.publish();
        dropped
    }

    pub fn drain(&mut self) -> Vec<AllocationRecord> {
        self.sizes.clear();
        let records = std::mem::take(&mut self.records);
        self.publish();
        records
    }

    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }
}

/// Everything the manager mutex protects
#[derive(Debug)]
pub(crate) struct LedgerState {
    pub ledger: Ledger,
    pub pools: [PoolDescriptor; 4],
    pub stats: AllocatorStatistics,
    /// Owners stay listed at zero bytes so their peak survives a full release
    pub owners: HashMap<String, OwnerMemoryStats>,
}

impl LedgerState {
    pub fn new(live: Arc<AtomicUsize>) -> Self {
        Self {
            ledger: Ledger::new(live),
            pools: [PoolDescriptor::default(); 4],
            stats: AllocatorStatistics::default(),
            owners: HashMap::default(),
        }
    }

    pub fn pool(&self, kind: PoolKind) -> &PoolDescriptor {
        &self.pools[kind.index()]
    }

    pub fn pool_mut(&mut self, kind: PoolKind) -> &mut PoolDescriptor {
        &mut self.pools[kind.index()]
    }

    /// Stamp a new record and update the running bookkeeping
    ///
    /// Counters and sizes track external memory only; internal records
    /// (task control blocks) are attribution entries.
    pub fn track_allocation(&mut self, record: AllocationRecord) {
        if record.capability == Capability::External {
            self.stats.allocation_count += 1;
            self.stats.used_size += record.size;
            self.stats.free_size = self.stats.free_size.saturating_sub(record.size);
        }

        let owner = self.owners.entry(record.owner.clone()).or_default();
        owner.current_bytes += record.size;
        owner.allocation_count += 1;
        if owner.current_bytes > owner.peak_bytes {
            owner.peak_bytes = owner.current_bytes;
        }

        self.ledger.insert(record);
    }

    /// Undo the bookkeeping of a record already removed from the ledger
    pub fn track_release(&mut self, record: &AllocationRecord) {
        if record.capability == Capability::External {
            self.stats.free_count += 1;
            self.stats.used_size = self.stats.used_size.saturating_sub(record.size);
            self.stats.free_size = (self.stats.free_size + record.size).min(self.stats.total_size);
        }

        if let Some(owner) = self.owners.get_mut(&record.owner) {
            owner.current_bytes = owner.current_bytes.saturating_sub(record.size);
        }
    }

    /// Detach a dropped record from its owner without touching the counters
    ///
    /// The heap still holds the block, so only attribution changes.
    pub fn forget(&mut self, record: &AllocationRecord) {
        if let Some(owner) = self.owners.get_mut(&record.owner) {
            owner.current_bytes = owner.current_bytes.saturating_sub(record.size);
        }
    }

    /// Recompute sizes from the heap's own introspection
    pub fn refresh(&mut self, heap: &dyn CapabilityHeap) {
        let heap_stats = heap.stats(Capability::External);
        self.stats.total_size = heap_stats.total_bytes;
        self.stats.free_size = heap_stats.free_bytes;
        self.stats.used_size = heap_stats.total_bytes.saturating_sub(heap_stats.free_bytes);
        self.stats.largest_free_block = heap_stats.largest_free_block;
        self.stats.fragmentation_rate =
            AllocatorStatistics::fragmentation(heap_stats.free_bytes, heap_stats.largest_free_block);
    }
}
