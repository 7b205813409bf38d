//! Logging conventions shared by all pipeline crates.
//!
//! Every workflow step logs in IPO form: what came in (`[INPUT]`), what is
//! being done (`[PROCESS]`), and what came out (`[OUTPUT]`). The prefixes are
//! plain message markers carried through `tracing`, so `RUST_LOG` filtering
//! and structured fields keep working as usual.

use tracing_subscriber::EnvFilter;

/// Marker for data entering a workflow step.
pub const LOG_INPUT: &str = "[INPUT]";

/// Marker for intermediate processing.
pub const LOG_PROCESS: &str = "[PROCESS]";

/// Marker for data leaving a workflow step.
pub const LOG_OUTPUT: &str = "[OUTPUT]";

/// Initialize the global tracing subscriber.
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`. Safe to call once
/// per process; binaries call this before touching the database or network.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
