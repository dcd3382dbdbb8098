/*!
 * External Memory Manager
 *
 * Bookkeeping and policy layer over the capability heap. Carving is
 * delegated to the platform primitive; the manager keeps the ledger of
 * live blocks, attribution, statistics and the background monitor.
 *
 * ## Locking
 *
 * Ledger, lookup map, pool table and running statistics sit behind one
 * mutex acquired with a bounded wait. A timeout fails the operation with
 * `AllocError::LockTimeout`; nothing blocks forever.
 *
 * ## Sharing
 *
 * `PsramManager` is a cheap `Clone` over shared state. Collaborators are
 * handed a clone at construction instead of reaching for a global.
 */

mod allocator;
mod diagnostics;
mod gc;
mod guard_ext;
mod ledger;
mod pool;
mod stats;
mod task_stack;

pub use diagnostics::{BlockReport, StatusReport};
pub use guard_ext::BlockGuardExt;
pub use task_stack::TaskGrant;

use super::traits::{Allocator, GarbageCollector, MemoryInfo, OwnerMemoryCleanup};
use super::types::{AllocError, AllocResult, AllocationRecord, AllocatorStatistics, PoolKind};
use crate::core::config::AllocatorConfig;
use crate::core::limits::UNKNOWN_OWNER;
use crate::core::types::{Address, Capability, Size, Timestamp};
use crate::monitoring::MonitorTask;
use crate::platform::{CapabilityHeap, SimulatedHeap, TaskScheduler, ThreadScheduler};
use ledger::LedgerState;
use log::{info, warn};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Callback invoked by the monitor with an owned statistics snapshot
pub type MonitorCallback = Arc<dyn Fn(AllocatorStatistics) + Send + Sync>;

/// External memory manager
pub struct PsramManager {
    pub(super) state: Arc<Mutex<LedgerState>>,
    pub(super) heap: Arc<dyn CapabilityHeap>,
    pub(super) scheduler: Arc<dyn TaskScheduler>,
    pub(super) config: Arc<AllocatorConfig>,
    initialized: Arc<AtomicBool>,
    debug_mode: Arc<AtomicBool>,
    // Mirrors the ledger length so block_count() never takes the lock
    block_count: Arc<AtomicUsize>,
    monitor: Arc<Mutex<Option<MonitorTask>>>,
    callback: Arc<RwLock<Option<MonitorCallback>>>,
    epoch: Instant,
}

impl PsramManager {
    pub fn new(heap: Arc<dyn CapabilityHeap>, scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self::with_config(heap, scheduler, AllocatorConfig::default())
    }

    pub fn with_config(
        heap: Arc<dyn CapabilityHeap>,
        scheduler: Arc<dyn TaskScheduler>,
        config: AllocatorConfig,
    ) -> Self {
        let block_count = Arc::new(AtomicUsize::new(0));
        Self {
            state: Arc::new(Mutex::new(LedgerState::new(Arc::clone(&block_count)))),
            heap,
            scheduler,
            debug_mode: Arc::new(AtomicBool::new(config.debug_mode)),
            config: Arc::new(config),
            initialized: Arc::new(AtomicBool::new(false)),
            block_count,
            monitor: Arc::new(Mutex::new(None)),
            callback: Arc::new(RwLock::new(None)),
            epoch: Instant::now(),
        }
    }

    /// Manager over the simulated heap and thread scheduler
    pub fn host(config: AllocatorConfig) -> Self {
        Self::with_config(
            Arc::new(SimulatedHeap::new()),
            Arc::new(ThreadScheduler::new()),
            config,
        )
    }

    /// Prepare the manager for use
    ///
    /// Idempotent. Pools are left unreserved: every allocation goes
    /// straight to the capability heap.
    pub fn init(&self) -> AllocResult<()> {
        if self.is_initialized() {
            info!("External memory manager already initialized");
            return Ok(());
        }

        if !self.is_available() {
            warn!("External memory is not present, manager stays uninitialized");
            return Err(AllocError::ExternalMemoryMissing);
        }

        {
            let mut state = self.lock()?;
            state.refresh(self.heap.as_ref());
            state.pools = Default::default();
            info!(
                "External memory: {} KB total, {} KB free",
                state.stats.total_size / 1024,
                state.stats.free_size / 1024
            );
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!("External memory manager initialized (on-demand allocation, no pool reservation)");
        Ok(())
    }

    /// Start the background monitor
    ///
    /// No-op while the monitor is already running.
    pub fn start(&self) -> AllocResult<()> {
        self.ensure_initialized()?;

        let mut monitor = self.monitor.lock();
        if monitor.as_ref().is_some_and(MonitorTask::is_running) {
            info!("Monitor already running");
            return Ok(());
        }

        let task = MonitorTask::spawn(
            self.scheduler.as_ref(),
            self.clone(),
            self.config.monitor_period,
        )
        .map_err(AllocError::MonitorSpawn)?;
        *monitor = Some(task);
        Ok(())
    }

    /// Stop the background monitor without draining
    pub fn stop(&self) {
        if let Some(task) = self.monitor.lock().take() {
            task.stop(self.scheduler.as_ref());
        }
    }

    /// Stop the monitor, release every tracked block and uninitialize
    ///
    /// Returns the number of records released.
    pub fn shutdown(&self) -> AllocResult<usize> {
        self.stop();

        let records = {
            let mut state = self.lock()?;
            let records = state.ledger.drain();
            for record in &records {
                state.track_release(record);
            }
            for kind in PoolKind::ALL {
                if let Some(base) = state.pool(kind).base_address {
                    self.heap.free(base);
                }
            }
            state.pools = Default::default();
            records
        };

        for record in &records {
            if !self.heap.free(record.base_address()) {
                warn!(
                    "Shutdown: heap rejected block 0x{:x} ({})",
                    record.address, record.purpose
                );
            }
        }

        self.initialized.store(false, Ordering::SeqCst);
        info!("External memory manager shut down, {} blocks released", records.len());
        Ok(records.len())
    }

    /// Whether the external capability is backed by memory
    pub fn is_available(&self) -> bool {
        self.heap.is_present(Capability::External)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Whether the background monitor is running
    pub fn is_running(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(MonitorTask::is_running)
    }

    pub fn set_monitor_callback<F>(&self, callback: F)
    where
        F: Fn(AllocatorStatistics) + Send + Sync + 'static,
    {
        *self.callback.write() = Some(Arc::new(callback));
    }

    pub fn clear_monitor_callback(&self) {
        *self.callback.write() = None;
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.debug_mode.store(enabled, Ordering::SeqCst);
        info!("Debug mode: {}", if enabled { "on" } else { "off" });
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub(super) fn debug_enabled(&self) -> bool {
        self.debug_mode.load(Ordering::Relaxed)
    }

    pub(super) fn monitor_callback(&self) -> Option<MonitorCallback> {
        self.callback.read().clone()
    }

    /// Acquire the ledger mutex with the configured bounded wait
    pub(super) fn lock(&self) -> AllocResult<MutexGuard<'_, LedgerState>> {
        self.state
            .try_lock_for(self.config.lock_timeout)
            .ok_or_else(|| {
                warn!("Ledger lock not acquired within {:?}", self.config.lock_timeout);
                AllocError::LockTimeout(self.config.lock_timeout)
            })
    }

    pub(super) fn ensure_initialized(&self) -> AllocResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(AllocError::NotInitialized)
        }
    }

    /// Name of the calling task, or the unknown-owner marker
    pub(super) fn current_owner(&self) -> String {
        self.scheduler
            .current_task_name()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_OWNER.to_string())
    }

    /// Milliseconds since the manager was created
    pub(super) fn now_ms(&self) -> Timestamp {
        self.epoch.elapsed().as_millis() as Timestamp
    }
}

impl Allocator for PsramManager {
    fn allocate(&self, size: Size, purpose: &str, pool: PoolKind) -> AllocResult<Address> {
        PsramManager::allocate(self, size, purpose, pool)
    }

    fn allocate_aligned(
        &self,
        size: Size,
        alignment: Size,
        pool: PoolKind,
    ) -> AllocResult<Address> {
        PsramManager::allocate_aligned(self, size, alignment, pool)
    }

    fn deallocate(&self, address: Address) -> AllocResult<()> {
        PsramManager::deallocate(self, address)
    }

    fn block_size(&self, address: Address) -> Option<Size> {
        PsramManager::block_size(self, address)
    }
}

impl MemoryInfo for PsramManager {
    fn statistics(&self) -> AllocResult<AllocatorStatistics> {
        PsramManager::statistics(self)
    }

    fn info(&self) -> (Size, Size, Size) {
        (self.total_size(), self.used_size(), self.free_size())
    }
}

impl GarbageCollector for PsramManager {
    fn collect(&self) -> AllocResult<usize> {
        PsramManager::garbage_collect(self)
    }
}

impl OwnerMemoryCleanup for PsramManager {
    fn free_owner_memory(&self, owner: &str) -> AllocResult<usize> {
        PsramManager::deallocate_all(self, owner)
    }

    fn owner_allocations(&self, owner: &str) -> Vec<AllocationRecord> {
        PsramManager::owner_allocations(self, owner)
    }
}

impl Clone for PsramManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            heap: Arc::clone(&self.heap),
            scheduler: Arc::clone(&self.scheduler),
            config: Arc::clone(&self.config),
            initialized: Arc::clone(&self.initialized),
            debug_mode: Arc::clone(&self.debug_mode),
            block_count: Arc::clone(&self.block_count),
            monitor: Arc::clone(&self.monitor),
            callback: Arc::clone(&self.callback),
            epoch: self.epoch,
        }
    }
}

impl std::fmt::Debug for PsramManager {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PsramManager")
            .field("initialized", &self.is_initialized())
            .field("block_count", &self.block_count.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for PsramManager {
    fn default() -> Self {
        Self::host(AllocatorConfig::default())
    }
}
