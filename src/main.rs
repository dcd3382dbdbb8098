/*!
 * PSRAM Monitor - Main Entry Point
 *
 * Host harness for the external memory manager:
 * - Initializes the manager over the simulated heap
 * - Starts the background monitor
 * - Runs a demo workload (buffers, graphics surface, external-stack task)
 * - Reports status until Ctrl+C
 */

use anyhow::{Context, Result};
use psram_manager::monitoring::init_tracing;
use psram_manager::{AllocatorConfig, BlockGuardExt, CoreAffinity, PoolKind, PsramManager};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("PSRAM monitor starting...");
    info!("================================================");

    info!("Loading allocator configuration...");
    let config = AllocatorConfig::from_env();
    info!(
        lock_timeout = ?config.lock_timeout,
        monitor_period = ?config.monitor_period,
        debug = config.debug_mode,
        "Configuration loaded"
    );

    info!("Initializing external memory manager...");
    let manager = PsramManager::host(config);
    manager.init().context("external memory manager init")?;
    let status_period = manager.config().monitor_period.max(Duration::from_secs(1));

    manager.set_monitor_callback(|stats| {
        info!(
            used = stats.used_size,
            free = stats.free_size,
            fragmentation = %format!("{:.1}%", stats.fragmentation_percent()),
            pressure = %stats.pressure(),
            "Monitor snapshot"
        );
    });
    manager.start().context("starting monitor")?;

    info!("Running demo workload...");
    run_demo(&manager).context("demo workload")?;

    manager.print_statistics()?;
    manager.print_memory_map()?;

    info!("Initialization complete");
    info!("================================================");
    info!("Press Ctrl+C to exit");

    let mut ticker = tokio::time::interval(status_period * 6);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                match manager.status_json() {
                    Ok(json) => info!(status = %json, "Status"),
                    Err(e) => warn!(error = %e, "Status unavailable"),
                }
            }
        }
    }

    let released = manager.shutdown().context("shutdown")?;
    info!(released, "PSRAM monitor stopped");
    Ok(())
}

/// Exercise each allocation path the firmware collaborators use
fn run_demo(manager: &PsramManager) -> Result<()> {
    let audio = manager.allocate_for_task(64 * 1024, "audio", "sample ring")?;
    let _json = manager.allocate_data_buffer(16 * 1024, "weather json")?;
    let frame = manager.allocate_graphics_buffer(368, 448, 2)?;
    info!(
        audio = %format!("0x{:x}", audio),
        frame = %format!("0x{:x}", frame),
        "Demo buffers allocated"
    );

    {
        let scratch = manager.allocate_guard(8 * 1024, "http scratch", PoolKind::Buffers)?;
        info!(address = %format!("0x{:x}", scratch.address()), "Scoped scratch buffer");
    }

    let grant = manager.create_task_with_external_stack(
        || tracing::info!("Demo task ran on an external-memory stack"),
        "DemoTask",
        2048,
        2,
        CoreAffinity::Pinned(1),
    )?;
    info!(
        task = %grant.handle.name,
        stack = %format!("0x{:x}", grant.stack),
        control_block = %format!("0x{:x}", grant.control_block),
        "Demo task created"
    );

    let released = manager.deallocate_all("audio")?;
    info!(released, "Released audio buffers");
    Ok(())
}
