/*!
 * Core Types
 * Common types used across the allocator
 */

use serde::{Deserialize, Serialize};

/// Address type for memory operations (0 is the null handle)
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Milliseconds since the allocator was created
pub type Timestamp = u64;

/// Scheduler priority (higher runs first)
pub type Priority = u8;

/// Scheduler-assigned task identifier
pub type TaskId = u64;

/// Tagged memory region a raw allocation is carved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Secondary, bulk memory (PSRAM). Large but slower to access.
    External,
    /// Fast on-chip memory (SRAM). Scheduler control structures live here.
    Internal,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Capability::External => write!(f, "external"),
            Capability::Internal => write!(f, "internal"),
        }
    }
}

/// Core a scheduled unit may run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreAffinity {
    /// Let the scheduler pick any core
    Any,
    /// Pin to one core
    Pinned(u8),
}

impl std::fmt::Display for CoreAffinity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CoreAffinity::Any => write!(f, "any"),
            CoreAffinity::Pinned(core) => write!(f, "core{}", core),
        }
    }
}

/// Round `value` up to a power-of-two `alignment`
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}
