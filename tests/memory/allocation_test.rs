/*!
 * Allocation API Tests
 * Allocation, alignment, deallocation and bulk release
 */

use crate::support::manager_with;
use psram_manager::platform::HeapStats;
use psram_manager::{
    AllocError, AllocatorConfig, Allocator, Capability, CapabilityHeap, PoolKind, PsramManager,
    SimulatedHeap, ThreadScheduler,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const KB: usize = 1024;

#[test]
fn test_block_count_tracks_allocations() {
    let manager = manager_with(256 * KB, 16 * KB);

    let a = manager.allocate(100, "a", PoolKind::General).unwrap();
    let b = manager.allocate(200, "b", PoolKind::Buffers).unwrap();
    let c = manager.allocate(300, "c", PoolKind::Graphics).unwrap();
    assert_eq!(manager.block_count(), 3);

    manager.deallocate(b).unwrap();
    assert_eq!(manager.block_count(), 2);
    manager.deallocate(a).unwrap();
    manager.deallocate(c).unwrap();
    assert_eq!(manager.block_count(), 0);
}

#[test]
fn test_double_free_fails_without_touching_state() {
    let manager = manager_with(256 * KB, 16 * KB);
    let addr = manager.allocate(512, "once", PoolKind::General).unwrap();

    manager.deallocate(addr).unwrap();
    let before = manager.statistics().unwrap();

    assert_eq!(manager.deallocate(addr), Err(AllocError::InvalidHandle(addr)));
    let after = manager.statistics().unwrap();
    assert_eq!(before, after);
    assert_eq!(after.free_count, 1);
}

#[test]
fn test_purpose_carries_pool_and_caller_text() {
    let manager = manager_with(256 * KB, 16 * KB);
    let addr = manager.allocate(100, "X", PoolKind::Buffers).unwrap();

    let info = manager.block_info(addr).unwrap();
    assert!(info.purpose.contains(PoolKind::Buffers.name()));
    assert!(info.purpose.contains("X"));
    assert_eq!(info.size, 100);
    assert_eq!(info.capability, Capability::External);
}

#[test]
fn test_deallocate_all_releases_owner_blocks() {
    let manager = manager_with(256 * KB, 16 * KB);
    let addrs: Vec<_> = (0..3)
        .map(|i| {
            manager
                .allocate_for_task(1024, "T1", &format!("block {}", i))
                .unwrap()
        })
        .collect();
    let other = manager.allocate_for_task(64, "T2", "keep").unwrap();

    assert_eq!(manager.deallocate_all("T1"), Ok(3));
    assert_eq!(manager.block_count(), 1);
    for addr in addrs {
        assert_eq!(manager.deallocate(addr), Err(AllocError::InvalidHandle(addr)));
    }
    assert!(manager.block_info(other).is_some());
}

#[test]
fn test_deallocate_all_rejects_empty_owner() {
    let manager = manager_with(16 * KB, 4 * KB);
    assert_eq!(manager.deallocate_all(""), Err(AllocError::InvalidTaskName));
    assert_eq!(manager.deallocate_all("nobody"), Ok(0));
}

#[test]
fn test_aligned_handle_is_canonical() {
    let manager = manager_with(256 * KB, 16 * KB);
    let _pad = manager.allocate(12, "pad", PoolKind::General).unwrap();

    let addr = manager.allocate_aligned(100, 64, PoolKind::General).unwrap();
    assert_eq!(addr % 64, 0);
    assert!(manager.is_valid(addr));

    let base = manager.block_info(addr).unwrap().base_address();
    assert!(base < addr);
    assert!(manager.block_info(base).is_none());
    assert_eq!(manager.deallocate(base), Err(AllocError::InvalidHandle(base)));

    manager.deallocate(addr).unwrap();
    assert!(manager.validate_heap());
}

#[test]
fn test_exhaustion_does_not_count_allocation() {
    let manager = manager_with(16 * KB, 4 * KB);

    let mut held = Vec::new();
    while let Ok(addr) = manager.allocate(1024, "fill", PoolKind::General) {
        held.push(addr);
    }
    assert_eq!(held.len(), 16);

    let before = manager.statistics().unwrap().allocation_count;
    assert_eq!(
        manager.allocate(1, "one more", PoolKind::General),
        Err(AllocError::OutOfMemory {
            requested: 1,
            capability: Capability::External
        })
    );
    assert_eq!(manager.statistics().unwrap().allocation_count, before);
    assert_eq!(manager.block_count(), 16);
}

#[test]
fn test_init_without_external_memory() {
    let manager = PsramManager::new(
        Arc::new(SimulatedHeap::with_sizes(0, 4 * KB)),
        Arc::new(ThreadScheduler::new()),
    );
    assert!(!manager.is_available());
    assert_eq!(manager.init(), Err(AllocError::ExternalMemoryMissing));
    assert!(!manager.is_initialized());
    assert_eq!(
        manager.allocate(8, "x", PoolKind::General),
        Err(AllocError::NotInitialized)
    );
}

#[test]
fn test_shutdown_releases_everything() {
    let manager = manager_with(64 * KB, 4 * KB);
    manager.allocate(1024, "a", PoolKind::General).unwrap();
    manager.allocate_aligned(1000, 256, PoolKind::Graphics).unwrap();
    manager.create_pool(PoolKind::Buffers, 4 * KB).unwrap();

    assert_eq!(manager.shutdown(), Ok(2));
    assert_eq!(manager.used_size(), 0);
    assert_eq!(manager.block_count(), 0);
    assert!(!manager.is_initialized());

    manager.init().unwrap();
    assert!(manager.allocate(16, "again", PoolKind::General).is_ok());
}

/// Heap whose external malloc parks until released
struct GatedHeap {
    inner: SimulatedHeap,
    entered: flume::Sender<()>,
    gate: flume::Receiver<()>,
}

impl CapabilityHeap for GatedHeap {
    fn malloc(&self, size: usize, capability: Capability) -> Option<usize> {
        let _ = self.entered.send(());
        let _ = self.gate.recv_timeout(Duration::from_secs(5));
        self.inner.malloc(size, capability)
    }

    fn free(&self, address: usize) -> bool {
        self.inner.free(address)
    }

    fn stats(&self, capability: Capability) -> HeapStats {
        self.inner.stats(capability)
    }

    fn check_integrity(&self) -> bool {
        self.inner.check_integrity()
    }
}

#[test]
fn test_lock_timeout_is_a_hard_failure() {
    let (entered_tx, entered_rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::unbounded();
    let manager = PsramManager::with_config(
        Arc::new(GatedHeap {
            inner: SimulatedHeap::with_sizes(64 * KB, 4 * KB),
            entered: entered_tx,
            gate: gate_rx,
        }),
        Arc::new(ThreadScheduler::new()),
        AllocatorConfig::default().with_lock_timeout(Duration::from_millis(50)),
    );
    manager.init().unwrap();

    let holder = manager.clone();
    let worker = std::thread::spawn(move || holder.allocate(64, "slow", PoolKind::General));

    // The worker now holds the ledger lock inside malloc
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        manager.allocate(64, "blocked", PoolKind::General),
        Err(AllocError::LockTimeout(Duration::from_millis(50)))
    );

    gate_tx.send(()).unwrap();
    assert!(worker.join().unwrap().is_ok());
    assert_eq!(manager.block_count(), 1);
}
