/*!
 * Allocator Configuration
 *
 * Runtime configuration for the external memory manager
 */

use super::limits;
use super::types::{Address, Capability};
use log::warn;
use std::ops::Range;
use std::time::Duration;

/// Allocator configuration
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Bounded wait for the ledger mutex
    pub lock_timeout: Duration,
    /// Period between background monitor cycles
    pub monitor_period: Duration,
    /// Log every allocation and deallocation
    pub debug_mode: bool,
    /// Addresses a live external record may hold
    pub external_range: Range<Address>,
    /// Addresses a live internal record may hold
    pub internal_range: Range<Address>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: limits::DEFAULT_LOCK_TIMEOUT,
            monitor_period: limits::DEFAULT_MONITOR_PERIOD,
            debug_mode: false,
            external_range: limits::EXTERNAL_REGION_BASE..limits::EXTERNAL_REGION_END,
            internal_range: limits::INTERNAL_REGION_BASE
                ..limits::INTERNAL_REGION_BASE + limits::DEFAULT_INTERNAL_SIZE,
        }
    }
}

impl AllocatorConfig {
    /// Build configuration from defaults overridden by environment variables
    ///
    /// Environment variables:
    /// - PSRAM_LOCK_TIMEOUT_MS: ledger lock timeout (default: 1000)
    /// - PSRAM_MONITOR_PERIOD_MS: monitor period (default: 5000)
    /// - PSRAM_DEBUG: log every allocation (default: false)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_millis("PSRAM_LOCK_TIMEOUT_MS") {
            config.lock_timeout = ms;
        }
        if let Some(ms) = env_millis("PSRAM_MONITOR_PERIOD_MS") {
            config.monitor_period = ms;
        }
        config.debug_mode = std::env::var("PSRAM_DEBUG")
            .map(|v| v == "1" || v == "true")
            .unwrap_or(false);

        config
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_monitor_period(mut self, period: Duration) -> Self {
        self.monitor_period = period;
        self
    }

    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    pub fn with_external_range(mut self, range: Range<Address>) -> Self {
        self.external_range = range;
        self
    }

    pub fn with_internal_range(mut self, range: Range<Address>) -> Self {
        self.internal_range = range;
        self
    }

    /// Valid address range for a capability
    pub fn range_for(&self, capability: Capability) -> &Range<Address> {
        match capability {
            Capability::External => &self.external_range,
            Capability::Internal => &self.internal_range,
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}
