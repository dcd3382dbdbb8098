/*!
 * System Limits and Constants
 *
 * Centralized location for allocator limits, thresholds, and platform numbers.
 * Grouped by domain; platform-dictated values are marked with [PLATFORM].
 */

use std::time::Duration;

// =============================================================================
// MEMORY REGIONS
// =============================================================================

/// Start of the external (PSRAM) data window
/// [PLATFORM] ESP32-S3 maps PSRAM at 0x3D80_0000
pub const EXTERNAL_REGION_BASE: usize = 0x3D80_0000;

/// End (exclusive) of the external data window
/// [PLATFORM] 8MB window
pub const EXTERNAL_REGION_END: usize = 0x3E00_0000;

/// Default simulated external memory size (8MB, the whole window)
pub const DEFAULT_EXTERNAL_SIZE: usize = EXTERNAL_REGION_END - EXTERNAL_REGION_BASE;

/// Start of the internal (SRAM) data region
pub const INTERNAL_REGION_BASE: usize = 0x3FC8_8000;

/// Default simulated internal memory size (320KB)
pub const DEFAULT_INTERNAL_SIZE: usize = 320 * 1024;

/// Granularity of the capability heap; every raw block is a multiple of this
/// [PLATFORM] heap_caps_malloc returns 4-byte aligned blocks
pub const HEAP_GRANULARITY: usize = 4;

// =============================================================================
// TASK STACKS
// =============================================================================

/// Size of one stack word
/// [PLATFORM] StackType_t is 32 bits
pub const STACK_WORD_SIZE: usize = 4;

/// Requested stack word counts are rounded up to a multiple of this
pub const STACK_WORD_ROUNDING: usize = 4;

/// Alignment of externally-backed task stacks
pub const STACK_ALIGNMENT: usize = 8;

/// Size of the scheduler control block for one task
/// [PLATFORM] sizeof(StaticTask_t) on the dual-core target
pub const CONTROL_BLOCK_SIZE: usize = 344;

// =============================================================================
// GRAPHICS
// =============================================================================

/// Graphics surfaces are aligned for DMA transfers
pub const GRAPHICS_ALIGNMENT: usize = 32;

// =============================================================================
// LOCKING
// =============================================================================

/// Bounded wait for the ledger mutex
/// Failing to acquire within this window fails the operation
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1000);

// =============================================================================
// BACKGROUND MONITOR
// =============================================================================

/// Period between monitor cycles
pub const DEFAULT_MONITOR_PERIOD: Duration = Duration::from_secs(5);

/// Monitor task name as shown by the scheduler
pub const MONITOR_TASK_NAME: &str = "PSRAMMonitor";

/// Monitor stack size in words
pub const MONITOR_STACK_WORDS: usize = 4096;

/// Monitor runs at low priority
pub const MONITOR_PRIORITY: u8 = 1;

/// Monitor is pinned to the protocol core
pub const MONITOR_CORE: u8 = 0;

// =============================================================================
// MEMORY PRESSURE
// =============================================================================

/// Usage ratio at which pressure is reported as medium
pub const PRESSURE_MEDIUM: f64 = 0.60;

/// Usage ratio at which allocations log a warning
pub const PRESSURE_HIGH: f64 = 0.80;

/// Usage ratio considered critical
pub const PRESSURE_CRITICAL: f64 = 0.95;

// =============================================================================
// ATTRIBUTION
// =============================================================================

/// Owner recorded when the caller is not a named task
pub const UNKNOWN_OWNER: &str = "unknown";

/// Purpose recorded for aligned allocations without an explicit purpose
pub const ALIGNED_PURPOSE: &str = "aligned allocation";
