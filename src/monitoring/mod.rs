/*!
 * Monitoring Module
 *
 * Background statistics monitor and tracing setup for the binary.
 */

mod monitor;
mod tracer;

pub use monitor::MonitorTask;
pub use tracer::{init_tracing, monitor_cycle_span};
