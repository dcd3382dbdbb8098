/*!
 * Garbage Collection
 * Ledger hygiene and the periodic monitor cycle
 */

use super::super::types::{AllocResult, AllocatorStatistics};
use super::ledger::LedgerState;
use super::PsramManager;
use log::{debug, info, warn};

impl PsramManager {
    /// Drop records whose address lies outside the range of their capability
    ///
    /// Memory is not freed: such a record cannot describe a block the heap
    /// handed out.
    fn cleanup_expired_blocks(&self, state: &mut LedgerState) -> usize {
        let config = &self.config;
        let dropped = state
            .ledger
            .retain(|record| config.range_for(record.capability).contains(&record.address));

        for record in &dropped {
            debug!(
                "Dropped stale record 0x{:x} ({} bytes, {})",
                record.address, record.size, record.purpose
            );
            state.forget(record);
        }
        dropped.len()
    }

    /// Drop stale records and refresh statistics
    pub fn garbage_collect(&self) -> AllocResult<usize> {
        let mut state = self.lock()?;
        let dropped = self.cleanup_expired_blocks(&mut state);
        state.refresh(self.heap.as_ref());
        if dropped > 0 {
            info!("Garbage collection dropped {} stale records", dropped);
        }
        Ok(dropped)
    }

    /// Same as `garbage_collect`; the heap is never compacted
    pub fn defragment(&self) -> AllocResult<usize> {
        info!("Defragmenting external memory ledger");
        let dropped = self.garbage_collect()?;
        info!("Defragmentation done, {} records dropped", dropped);
        Ok(dropped)
    }

    /// Integrity walk of every heap region
    pub fn validate_heap(&self) -> bool {
        let ok = self.heap.check_integrity();
        if !ok {
            warn!("Heap integrity check failed");
        }
        ok
    }

    /// One monitor pass: collect, refresh, then notify outside the lock
    pub fn monitor_cycle(&self) -> AllocResult<AllocatorStatistics> {
        let snapshot = {
            let mut state = self.lock()?;
            self.cleanup_expired_blocks(&mut state);
            state.refresh(self.heap.as_ref());
            state.stats
        };

        if let Some(callback) = self.monitor_callback() {
            callback(snapshot);
        }
        Ok(snapshot)
    }
}
