/*!
 * Memory Types
 * Common types for external memory management
 */

use crate::core::limits::{PRESSURE_CRITICAL, PRESSURE_HIGH, PRESSURE_MEDIUM};
use crate::core::types::{Address, Capability, Size, Timestamp};
use crate::platform::SchedulerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Memory operation result
pub type AllocResult<T> = Result<T, AllocError>;

/// Allocator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("Allocator is not initialized")]
    NotInitialized,

    #[error("External memory capability is not present")]
    ExternalMemoryMissing,

    #[error("Zero-sized allocation requested")]
    ZeroSize,

    #[error("Invalid alignment {0}: must be a non-zero power of two")]
    InvalidAlignment(usize),

    #[error("Requested size overflows the address space")]
    SizeOverflow,

    #[error("Out of {capability} memory: requested {requested} bytes")]
    OutOfMemory {
        requested: Size,
        capability: Capability,
    },

    #[error("Ledger lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("Invalid memory handle: 0x{0:x}")]
    InvalidHandle(Address),

    #[error("Invalid task name")]
    InvalidTaskName,

    #[error("Task control block could not be allocated from internal memory")]
    ControlBlockUnavailable,

    #[error("Task creation failed: {0}")]
    TaskCreation(SchedulerError),

    #[error("Pool {0} is not reserved")]
    PoolNotReserved(PoolKind),

    #[error("Released {released} of {attempted} blocks")]
    PartialRelease { released: usize, attempted: usize },

    #[error("Monitor task could not be started: {0}")]
    MonitorSpawn(SchedulerError),
}

/// Logical pools used as an attribution dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    General,
    Graphics,
    Buffers,
    TaskStacks,
}

impl PoolKind {
    pub const ALL: [PoolKind; 4] = [
        PoolKind::General,
        PoolKind::Graphics,
        PoolKind::Buffers,
        PoolKind::TaskStacks,
    ];

    /// Name used as the purpose prefix
    pub fn name(self) -> &'static str {
        match self {
            PoolKind::General => "general pool",
            PoolKind::Graphics => "graphics pool",
            PoolKind::Buffers => "buffer pool",
            PoolKind::TaskStacks => "task stack pool",
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One live allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// Canonical handle; aligned allocations record the aligned address
    pub address: Address,
    pub size: Size,
    /// Requesting task, or "unknown"
    pub owner: String,
    /// Always "<pool> - <purpose>"
    pub purpose: String,
    pub allocated_at_ms: Timestamp,
    pub capability: Capability,
    /// Address returned by the capability heap
    #[serde(skip)]
    pub(crate) base: Address,
}

impl AllocationRecord {
    pub(crate) fn new(
        address: Address,
        size: Size,
        owner: String,
        purpose: String,
        allocated_at_ms: Timestamp,
        capability: Capability,
    ) -> Self {
        Self {
            address,
            size,
            owner,
            purpose,
            allocated_at_ms,
            capability,
            base: address,
        }
    }

    /// Address handed back to the capability heap on free
    pub fn base_address(&self) -> Address {
        self.base
    }
}

/// Logical pool bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub base_address: Option<Address>,
    pub total_size: Size,
    pub used_size: Size,
    pub initialized: bool,
}

impl PoolDescriptor {
    pub(crate) fn reserved(base: Address, size: Size) -> Self {
        Self {
            base_address: Some(base),
            total_size: size,
            used_size: 0,
            initialized: true,
        }
    }
}

/// Allocator statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocatorStatistics {
    pub total_size: Size,
    pub used_size: Size,
    pub free_size: Size,
    pub largest_free_block: Size,
    pub allocation_count: u64,
    pub free_count: u64,
    /// 1 - largest_free_block / free_size, 0 when nothing is free
    pub fragmentation_rate: f64,
}

impl AllocatorStatistics {
    /// Derive the fragmentation ratio from free space figures
    pub fn fragmentation(free_size: Size, largest_free_block: Size) -> f64 {
        if free_size == 0 {
            0.0
        } else {
            1.0 - (largest_free_block as f64 / free_size as f64)
        }
    }

    pub fn usage_percent(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.used_size as f64 / self.total_size as f64) * 100.0
        }
    }

    pub fn fragmentation_percent(&self) -> f64 {
        self.fragmentation_rate * 100.0
    }

    pub fn pressure(&self) -> MemoryPressure {
        MemoryPressure::from_ratio(self.usage_percent() / 100.0)
    }
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= PRESSURE_CRITICAL {
            MemoryPressure::Critical
        } else if ratio >= PRESSURE_HIGH {
            MemoryPressure::High
        } else if ratio >= PRESSURE_MEDIUM {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Per-owner memory statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMemoryStats {
    pub current_bytes: Size,
    pub peak_bytes: Size,
    pub allocation_count: usize,
}
