/*!
 * Task Stack Tests
 * External stacks, internal control blocks and failure unwinding
 */

use crate::support::{ProbeHeap, RefusingScheduler};
use psram_manager::core::limits::{CONTROL_BLOCK_SIZE, INTERNAL_REGION_BASE};
use psram_manager::{
    AllocError, AllocatorConfig, Capability, CapabilityHeap, CoreAffinity, PoolKind, PsramManager,
    ThreadScheduler,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const KB: usize = 1024;

fn manager_over(heap: Arc<ProbeHeap>) -> (PsramManager, Arc<ThreadScheduler>) {
    let scheduler = Arc::new(ThreadScheduler::new());
    let manager = PsramManager::with_config(heap, scheduler.clone(), AllocatorConfig::default());
    manager.init().unwrap();
    (manager, scheduler)
}

#[test]
fn test_control_block_comes_from_internal_memory() {
    let heap = Arc::new(ProbeHeap::with_sizes(64 * KB, 8 * KB));
    let (manager, scheduler) = manager_over(heap.clone());

    let grant = manager
        .create_task_with_external_stack(|| {}, "Sensor", 1024, 3, CoreAffinity::Any)
        .unwrap();
    assert!(scheduler.join(&grant.handle));

    assert_eq!(heap.internal_requests(), 1);
    assert!(grant.control_block >= INTERNAL_REGION_BASE);
    assert_eq!(
        heap.stats(Capability::Internal).free_bytes,
        8 * KB - CONTROL_BLOCK_SIZE
    );

    // Stack record plus control block record
    assert_eq!(manager.block_count(), 2);
    let stack = manager.block_info(grant.stack).unwrap();
    assert!(stack.purpose.starts_with(PoolKind::TaskStacks.name()));
    assert_eq!(stack.capability, Capability::External);
}

#[test]
fn test_control_block_failure_releases_stack() {
    let heap = Arc::new(ProbeHeap::with_sizes(64 * KB, 8 * KB));
    heap.refuse_internal.store(true, Ordering::SeqCst);
    let (manager, scheduler) = manager_over(heap.clone());

    let used_before = manager.used_size();
    let result =
        manager.create_task_with_external_stack(|| {}, "NoTcb", 2048, 1, CoreAffinity::Pinned(0));

    assert_eq!(result, Err(AllocError::ControlBlockUnavailable));
    assert_eq!(manager.used_size(), used_before);
    assert_eq!(manager.block_count(), 0);
    assert_eq!(scheduler.task_count(), 0);
}

#[test]
fn test_oversized_stack_never_touches_internal_memory() {
    let heap = Arc::new(ProbeHeap::with_sizes(16 * KB, 8 * KB));
    let (manager, _scheduler) = manager_over(heap.clone());

    let result = manager.create_task_with_external_stack(
        || {},
        "Huge",
        64 * KB,
        1,
        CoreAffinity::Any,
    );

    assert!(matches!(
        result,
        Err(AllocError::OutOfMemory {
            capability: Capability::External,
            ..
        })
    ));
    assert_eq!(heap.internal_requests(), 0);
    assert_eq!(manager.block_count(), 0);
}

#[test]
fn test_scheduler_refusal_releases_both_buffers() {
    let heap = Arc::new(ProbeHeap::with_sizes(64 * KB, 8 * KB));
    let scheduler = Arc::new(RefusingScheduler::default());
    let manager =
        PsramManager::with_config(heap.clone(), scheduler.clone(), AllocatorConfig::default());
    manager.init().unwrap();

    let result = manager.create_task_with_external_stack(|| {}, "Refused", 512, 1, CoreAffinity::Any);

    assert!(matches!(result, Err(AllocError::TaskCreation(_))));
    assert_eq!(scheduler.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(manager.used_size(), 0);
    assert_eq!(heap.stats(Capability::Internal).free_bytes, 8 * KB);
    assert_eq!(manager.block_count(), 0);
}

#[test]
fn test_allocations_inside_task_are_attributed_to_it() {
    let heap = Arc::new(ProbeHeap::with_sizes(64 * KB, 8 * KB));
    let (manager, scheduler) = manager_over(heap);

    let (tx, rx) = flume::bounded(1);
    let inner = manager.clone();
    let grant = manager
        .create_task_with_external_stack(
            move || {
                let _ = tx.send(inner.allocate(256, "frame", PoolKind::Buffers));
            },
            "Renderer",
            1024,
            2,
            CoreAffinity::Pinned(1),
        )
        .unwrap();

    let addr = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert!(scheduler.join(&grant.handle));

    assert_eq!(manager.block_info(addr).unwrap().owner, "Renderer");
    assert_eq!(manager.deallocate_all("Renderer"), Ok(1));
}
