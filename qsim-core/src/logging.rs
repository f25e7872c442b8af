//! Structured logging setup for simulation runs
//!
//! Log levels follow the kernel's conventions: `trace` for per-tick event
//! processing, `debug` for entity lifecycle and routing decisions, `info`
//! for run start/end. `RUST_LOG` overrides everything, e.g.
//! `RUST_LOG=qsim_core::model=trace` to watch the event loop.

use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging at the default `info` level.
pub fn init_simulation_logging() {
    init_simulation_logging_with_level("info");
}

/// Initialize logging at a specific level ("trace" through "error").
///
/// Safe to call more than once; later calls are no-ops, which keeps test
/// binaries that share a process happy.
pub fn init_simulation_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("qsim_core={level},qsim_scenarios={level}").into());

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .try_init();
}
