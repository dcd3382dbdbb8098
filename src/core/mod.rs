/*!
 * Core Module
 * Fundamental types, limits, configuration and guards
 */

pub mod config;
pub mod guard;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use config::AllocatorConfig;
pub use guard::{BlockGuard, Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
pub use types::*;
