/*!
 * Diagnostics
 *
 * Read-only projections of a statistics snapshot plus the full ledger:
 * a human-readable memory map and the JSON status document served to the
 * web dashboard.
 */

use super::super::types::{AllocResult, AllocationRecord};
use super::PsramManager;
use crate::core::types::{Size, Timestamp};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One ledger entry as exposed in the status document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReport {
    /// Lowercase hex without prefix
    pub address: String,
    pub size: Size,
    pub task_name: String,
    pub purpose: String,
    pub alloc_time: Timestamp,
}

impl From<&AllocationRecord> for BlockReport {
    fn from(record: &AllocationRecord) -> Self {
        Self {
            address: format!("{:x}", record.address),
            size: record.size,
            task_name: record.owner.clone(),
            purpose: record.purpose.clone(),
            alloc_time: record.allocated_at_ms,
        }
    }
}

/// Status document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub available: bool,
    pub total_size: Size,
    pub used_size: Size,
    pub free_size: Size,
    pub largest_free_block: Size,
    pub usage_percent: f64,
    /// Percent, unlike the ratio in `AllocatorStatistics`
    pub fragmentation_rate: f64,
    pub allocation_count: u64,
    pub free_count: u64,
    pub block_count: usize,
    pub allocated_blocks: Vec<BlockReport>,
}

impl PsramManager {
    /// Build the status document from one consistent snapshot
    pub fn status_report(&self) -> AllocResult<StatusReport> {
        let (stats, blocks) = {
            let mut state = self.lock()?;
            state.refresh(self.heap.as_ref());
            let blocks: Vec<BlockReport> =
                state.ledger.records().iter().map(BlockReport::from).collect();
            (state.stats, blocks)
        };

        Ok(StatusReport {
            available: self.is_available(),
            total_size: stats.total_size,
            used_size: stats.used_size,
            free_size: stats.free_size,
            largest_free_block: stats.largest_free_block,
            usage_percent: stats.usage_percent(),
            fragmentation_rate: stats.fragmentation_percent(),
            allocation_count: stats.allocation_count,
            free_count: stats.free_count,
            block_count: blocks.len(),
            allocated_blocks: blocks,
        })
    }

    /// Status document rendered as compact JSON
    pub fn status_json(&self) -> AllocResult<String> {
        let report = self.status_report()?;
        // Plain data structs always serialize
        Ok(serde_json::to_string(&report).unwrap_or_default())
    }

    /// Human-readable memory map
    pub fn memory_map(&self) -> AllocResult<String> {
        let report = self.status_report()?;
        let mut out = String::new();

        let _ = writeln!(out, "=== External Memory Map ===");
        let _ = writeln!(out, "Total:          {} KB", report.total_size / 1024);
        let _ = writeln!(
            out,
            "Used:           {} KB ({:.1}%)",
            report.used_size / 1024,
            report.usage_percent
        );
        let _ = writeln!(out, "Free:           {} KB", report.free_size / 1024);
        let _ = writeln!(out, "Largest block:  {} KB", report.largest_free_block / 1024);
        let _ = writeln!(out, "Fragmentation:  {:.1}%", report.fragmentation_rate);
        let _ = writeln!(out, "Blocks:         {}", report.block_count);
        let _ = writeln!(out, "--- Allocated blocks ---");
        for block in &report.allocated_blocks {
            let _ = writeln!(
                out,
                "0x{} {:>8} bytes  task: {:<16} {}",
                block.address, block.size, block.task_name, block.purpose
            );
        }
        let _ = write!(out, "===========================");
        Ok(out)
    }

    pub fn print_memory_map(&self) -> AllocResult<()> {
        for line in self.memory_map()?.lines() {
            info!("{}", line);
        }
        Ok(())
    }

    pub fn print_statistics(&self) -> AllocResult<()> {
        let stats = self.statistics()?;
        info!("=== External Memory Statistics ===");
        info!("Total:          {} KB", stats.total_size / 1024);
        info!("Used:           {} KB", stats.used_size / 1024);
        info!("Free:           {} KB", stats.free_size / 1024);
        info!("Largest block:  {} KB", stats.largest_free_block / 1024);
        info!("Allocations:    {}", stats.allocation_count);
        info!("Frees:          {}", stats.free_count);
        info!("Fragmentation:  {:.1}%", stats.fragmentation_percent());
        info!("Pressure:       {}", stats.pressure());
        Ok(())
    }
}
