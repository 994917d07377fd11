//! Tracing/logging initialization.
//!
//! Structured JSON lines on stdout, filtered through `RUST_LOG`. Worker
//! threads and the reconciliation engine log with tenant/location fields, so
//! downstream log tooling can slice per site.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Safe to call
/// multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    install(filter);
}

/// Initialize with an explicit filter directive, ignoring the environment.
///
/// Meant for tools that want a fixed verbosity, e.g. `"debug"` or
/// `"tillsync_offline=trace,info"`.
pub fn init_with_filter(directives: &str) {
    install(EnvFilter::new(directives));
}

fn install(filter: EnvFilter) {
    // JSON logs + timestamps; losing the race to another subscriber is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
