/*!
 * RAII Resource Guards
 *
 * Scoped ownership of ledger blocks with automatic cleanup.
 *
 * A guard releases its resource exactly once: either explicitly through
 * `release` / `release_early`, or on drop. Failures during drop are
 * logged, never panicked on.
 *
 * ## Example
 *
 * ```ignore
 * let guard = manager.allocate_guard(4096, "pcm", PoolKind::Buffers)?;
 * let addr = guard.address();
 * // Use memory
 * // Automatically freed on drop
 * ```
 */

mod memory;
mod traits;

pub use memory::BlockGuard;
pub use traits::{Guard, GuardDrop};

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Guard metadata for diagnostics
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    pub owner: Option<String>,
    pub size_bytes: usize,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            owner: None,
            size_bytes: 0,
        }
    }

    #[inline]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[inline]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size_bytes = size;
        self
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
