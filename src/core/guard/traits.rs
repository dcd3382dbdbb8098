/*!
 * Guard Traits
 *
 * Core abstractions for RAII resource guards
 */

use super::{GuardMetadata, GuardResult};

/// Core guard trait
pub trait Guard: Send {
    /// Resource type name for logging
    fn resource_type(&self) -> &'static str;

    fn metadata(&self) -> &GuardMetadata;

    /// Check if guard is still active
    fn is_active(&self) -> bool;

    /// Manually release the resource
    ///
    /// Returns `Err` if already released
    fn release(&mut self) -> GuardResult<()>;
}

/// Guards with custom cleanup on drop
pub trait GuardDrop: Guard {
    /// Perform cleanup on drop
    ///
    /// Must not panic; log errors instead.
    fn on_drop(&mut self);
}
