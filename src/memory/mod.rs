/*!
 * Memory Module
 * External memory management and allocation
 */

pub mod manager;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use manager::{BlockGuardExt, BlockReport, MonitorCallback, PsramManager, StatusReport, TaskGrant};
pub use traits::*;
pub use types::*;
