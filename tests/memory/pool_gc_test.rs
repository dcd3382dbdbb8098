/*!
 * Pool and Garbage Collection Tests
 */

use crate::support::manager_with;
use psram_manager::core::limits::INTERNAL_REGION_BASE;
use psram_manager::{
    AllocError, AllocatorConfig, CoreAffinity, GarbageCollector, PoolKind, PsramManager,
    SimulatedHeap, ThreadScheduler,
};
use std::sync::Arc;

const KB: usize = 1024;

#[test]
fn test_allocation_path_ignores_pools() {
    let manager = manager_with(64 * KB, 4 * KB);
    manager.create_pool(PoolKind::Graphics, 32 * KB).unwrap();

    manager.allocate(8 * KB, "surface", PoolKind::Graphics).unwrap();
    assert_eq!(manager.pool_usage(PoolKind::Graphics), Ok(0));
    assert_eq!(manager.used_size(), 40 * KB);
}

#[test]
fn test_pool_reservation_can_exhaust_memory() {
    let manager = manager_with(16 * KB, 4 * KB);
    manager.create_pool(PoolKind::Buffers, 16 * KB).unwrap();
    assert!(matches!(
        manager.allocate(16, "late", PoolKind::Buffers),
        Err(AllocError::OutOfMemory { .. })
    ));

    manager.destroy_pool(PoolKind::Buffers).unwrap();
    assert!(manager.allocate(16, "late", PoolKind::Buffers).is_ok());
}

#[test]
fn test_gc_keeps_internal_control_blocks() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let manager = PsramManager::with_config(
        Arc::new(SimulatedHeap::with_sizes(64 * KB, 8 * KB)),
        scheduler.clone(),
        AllocatorConfig::default(),
    );
    manager.init().unwrap();

    let grant = manager
        .create_task_with_external_stack(|| {}, "Keeper", 256, 1, CoreAffinity::Any)
        .unwrap();
    assert!(scheduler.join(&grant.handle));

    assert!(grant.control_block >= INTERNAL_REGION_BASE);
    assert_eq!(manager.collect(), Ok(0));
    assert_eq!(manager.block_count(), 2);
}

#[test]
fn test_gc_drops_records_outside_window() {
    let config = AllocatorConfig::default().with_external_range(0..1);
    let manager = PsramManager::with_config(
        Arc::new(SimulatedHeap::with_sizes(64 * KB, 4 * KB)),
        Arc::new(ThreadScheduler::new()),
        config,
    );
    manager.init().unwrap();
    manager.allocate(128, "a", PoolKind::General).unwrap();
    manager.allocate(128, "b", PoolKind::General).unwrap();

    assert_eq!(manager.defragment(), Ok(2));
    assert_eq!(manager.block_count(), 0);
    // Records are dropped, the heap still holds the memory
    assert_eq!(manager.used_size(), 256);
    assert!(manager.validate_heap());
}

#[test]
fn test_gc_does_not_count_dropped_records_as_frees() {
    let config = AllocatorConfig::default().with_external_range(0..1);
    let manager = PsramManager::with_config(
        Arc::new(SimulatedHeap::with_sizes(64 * KB, 4 * KB)),
        Arc::new(ThreadScheduler::new()),
        config,
    );
    manager.init().unwrap();
    manager.allocate(128, "stale", PoolKind::General).unwrap();
    let free_count = manager.statistics().unwrap().free_count;

    let (tx, rx) = flume::unbounded();
    manager.set_monitor_callback(move |stats| {
        let _ = tx.send(stats);
    });

    let snapshot = manager.monitor_cycle().unwrap();
    assert_eq!(manager.block_count(), 0);
    assert_eq!(snapshot.used_size, 128);
    assert_eq!(snapshot.free_count, free_count);
    assert_eq!(rx.try_recv().unwrap(), snapshot);

    let stats = manager.statistics().unwrap();
    assert_eq!(stats.free_count, free_count);
    assert_eq!(stats.used_size, manager.used_size());
}

#[test]
fn test_defragment_keeps_counters_consistent() {
    let config = AllocatorConfig::default().with_external_range(0..1);
    let manager = PsramManager::with_config(
        Arc::new(SimulatedHeap::with_sizes(64 * KB, 4 * KB)),
        Arc::new(ThreadScheduler::new()),
        config,
    );
    manager.init().unwrap();
    manager.allocate(256, "a", PoolKind::Buffers).unwrap();
    manager.allocate(512, "b", PoolKind::Buffers).unwrap();

    assert_eq!(manager.defragment(), Ok(2));

    let stats = manager.statistics().unwrap();
    assert_eq!(stats.free_count, 0);
    assert_eq!(stats.allocation_count, 2);
    assert_eq!(stats.used_size, 768);
    assert_eq!(stats.used_size, manager.used_size());
}
